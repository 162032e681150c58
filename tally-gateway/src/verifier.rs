//! Postback verification against PayPal
//!
//! A notification is only trusted after PayPal confirms it. The exact
//! raw bytes PayPal sent are posted back with a `_notify-validate`
//! command; PayPal answers `VERIFIED` for genuine notifications and
//! `INVALID` for anything else.

use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::Duration;

/// Production verification endpoint
pub const LIVE_VERIFY_URL: &str = "https://ipnpb.paypal.com/cgi-bin/webscr";
/// Sandbox verification endpoint
pub const SANDBOX_VERIFY_URL: &str = "https://ipnpb.sandbox.paypal.com/cgi-bin/webscr";

const VALIDATE_CMD: &[u8] = b"cmd=_notify-validate";
const VERIFIED: &str = "VERIFIED";

/// Outcome of one verification round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// PayPal confirmed the notification
    Verified,
    /// PayPal answered, but did not confirm it
    NotVerified,
    /// PayPal could not be reached or did not answer cleanly
    Unreachable(String),
}

/// Client that checks notifications back with PayPal
pub struct IpnVerifier {
    verify_url: String,
    client: reqwest::Client,
}

impl IpnVerifier {
    /// Create a verifier for the given endpoint and timeout
    pub fn new(verify_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { verify_url, client })
    }

    /// Verify one notification by posting its raw bytes back.
    ///
    /// The payload must go back byte for byte. Re-encoding the parsed
    /// fields could change the byte sequence and make PayPal reject
    /// its own message.
    pub async fn verify(&self, raw_payload: &[u8]) -> VerifyOutcome {
        let mut body = Vec::with_capacity(VALIDATE_CMD.len() + 1 + raw_payload.len());
        body.extend_from_slice(VALIDATE_CMD);
        body.push(b'&');
        body.extend_from_slice(raw_payload);

        let response = match self
            .client
            .post(&self.verify_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return VerifyOutcome::Unreachable(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return VerifyOutcome::Unreachable(format!("authority returned {status}"));
        }

        match response.text().await {
            Ok(text) if text == VERIFIED => VerifyOutcome::Verified,
            Ok(_) => VerifyOutcome::NotVerified,
            Err(e) => VerifyOutcome::Unreachable(e.to_string()),
        }
    }

    /// The endpoint this verifier talks to
    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }
}

impl fmt::Debug for IpnVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpnVerifier")
            .field("verify_url", &self.verify_url)
            .finish_non_exhaustive()
    }
}

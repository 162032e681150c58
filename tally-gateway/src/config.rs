//! Gateway configuration, read from the environment

use std::time::Duration;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Currency the tracker counts; anything else is acknowledged but
    /// not applied
    pub accepted_currency: String,
    /// PayPal verification settings
    pub paypal: PayPalConfig,
    /// Ledger store settings
    pub ledger: tally_ledger::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            accepted_currency: "USD".to_string(),
            paypal: PayPalConfig::default(),
            ledger: tally_ledger::Config::default(),
        }
    }
}

/// Which PayPal endpoint notifications are verified against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPalEnvironment {
    /// Production endpoint
    Live,
    /// Sandbox endpoint for test merchants
    Sandbox,
}

impl PayPalEnvironment {
    /// Verification endpoint for this environment
    pub fn verify_url(&self) -> &'static str {
        match self {
            Self::Live => crate::verifier::LIVE_VERIFY_URL,
            Self::Sandbox => crate::verifier::SANDBOX_VERIFY_URL,
        }
    }
}

/// PayPal verification settings
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    /// Live or sandbox
    pub environment: PayPalEnvironment,
    /// Explicit endpoint override, used in tests
    pub verify_url_override: Option<String>,
    /// Timeout for one verification round trip
    pub verify_timeout: Duration,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            environment: PayPalEnvironment::Live,
            verify_url_override: None,
            verify_timeout: Duration::from_secs(10),
        }
    }
}

impl PayPalConfig {
    /// The endpoint verification requests go to
    pub fn verify_url(&self) -> String {
        match &self.verify_url_override {
            Some(url) => url.clone(),
            None => self.environment.verify_url().to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let environment = match std::env::var("PAYPAL_ENV").as_deref() {
            Ok("sandbox") => PayPalEnvironment::Sandbox,
            _ => PayPalEnvironment::Live,
        };
        let verify_timeout_secs = std::env::var("VERIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            accepted_currency: std::env::var("ACCEPTED_CURRENCY")
                .unwrap_or_else(|_| "USD".to_string()),
            paypal: PayPalConfig {
                environment,
                verify_url_override: std::env::var("PAYPAL_VERIFY_URL").ok(),
                verify_timeout: Duration::from_secs(verify_timeout_secs),
            },
            ledger: tally_ledger::Config::from_env(),
        }
    }
}

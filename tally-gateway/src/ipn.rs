//! IPN payload parsing and donation business rules

use rust_decimal::Decimal;
use serde::Deserialize;
use tally_ledger::TxnId;
use thiserror::Error;

/// Payment status PayPal reports once a payment has settled
const STATUS_COMPLETED: &str = "Completed";

/// Form fields as they arrive; PayPal sends many more, all ignored
#[derive(Debug, Deserialize)]
struct RawIpn {
    txn_id: Option<String>,
    payment_status: Option<String>,
    mc_currency: Option<String>,
    mc_gross: Option<String>,
}

/// A parsed notification with the fields the gateway acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpnNotification {
    /// Processor transaction id
    pub txn_id: TxnId,
    /// Payment status as reported
    pub payment_status: String,
    /// Currency code of the gross amount
    pub mc_currency: String,
    /// Gross amount as reported, still unparsed
    pub mc_gross: String,
}

/// Why a payload failed to parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpnParseError {
    /// Not decodable as form-urlencoded
    #[error("Payload is not form-urlencoded: {0}")]
    Encoding(String),
    /// A required field is missing or empty
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

impl IpnNotification {
    /// Parse raw payload bytes into a notification
    pub fn parse(raw: &[u8]) -> Result<Self, IpnParseError> {
        let fields: RawIpn = serde_urlencoded::from_bytes(raw)
            .map_err(|e| IpnParseError::Encoding(e.to_string()))?;

        let txn_id = fields
            .txn_id
            .filter(|id| !id.is_empty())
            .ok_or(IpnParseError::MissingField("txn_id"))?;
        let payment_status = fields
            .payment_status
            .ok_or(IpnParseError::MissingField("payment_status"))?;
        let mc_currency = fields
            .mc_currency
            .ok_or(IpnParseError::MissingField("mc_currency"))?;
        let mc_gross = fields
            .mc_gross
            .ok_or(IpnParseError::MissingField("mc_gross"))?;

        Ok(Self {
            txn_id: TxnId::new(txn_id),
            payment_status,
            mc_currency,
            mc_gross,
        })
    }

    /// Check the donation rules, returning the gross amount when they
    /// all pass
    pub fn check_rules(&self, accepted_currency: &str) -> Result<Decimal, RuleViolation> {
        if self.payment_status != STATUS_COMPLETED {
            return Err(RuleViolation::StatusNotCompleted(
                self.payment_status.clone(),
            ));
        }
        if self.mc_currency != accepted_currency {
            return Err(RuleViolation::CurrencyMismatch {
                got: self.mc_currency.clone(),
                want: accepted_currency.to_string(),
            });
        }
        let amount: Decimal = self
            .mc_gross
            .parse()
            .map_err(|_| RuleViolation::UnparseableAmount(self.mc_gross.clone()))?;
        if amount <= Decimal::ZERO {
            return Err(RuleViolation::NonPositiveAmount(self.mc_gross.clone()));
        }
        Ok(amount)
    }
}

/// Why a verified notification was not a countable donation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    /// Payment has not settled (Pending, Refunded, Reversed, ...)
    #[error("Payment status is {0}, not Completed")]
    StatusNotCompleted(String),
    /// Donation in a currency the tracker does not count
    #[error("Currency {got} does not match accepted currency {want}")]
    CurrencyMismatch {
        /// Currency in the notification
        got: String,
        /// Currency the tracker counts
        want: String,
    },
    /// Gross amount did not parse as a decimal number
    #[error("Gross amount {0} is not a number")]
    UnparseableAmount(String),
    /// Gross amount was zero or negative
    #[error("Gross amount {0} is not positive")]
    NonPositiveAmount(String),
}

/// Terminal disposition of one notification, used in logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Payload did not parse
    Malformed,
    /// PayPal could not be reached to verify
    AuthorityUnreachable,
    /// PayPal did not confirm the notification
    NotVerified,
    /// Verified, but the donation rules refused it
    RuleViolation,
    /// Same transaction id was counted before
    Duplicate,
    /// The ledger refused the amount
    StoreRejected,
    /// Counted into the total
    Applied,
}

impl Disposition {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::AuthorityUnreachable => "authority_unreachable",
            Self::NotVerified => "not_verified",
            Self::RuleViolation => "rule_violation",
            Self::Duplicate => "duplicate",
            Self::StoreRejected => "store_rejected",
            Self::Applied => "applied",
        }
    }
}

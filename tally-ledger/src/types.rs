//! Core types for the donation ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processor-assigned transaction identifier.
///
/// Treated as an opaque string; the ledger only needs equality to
/// detect redelivery of the same notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId(String);

impl TxnId {
    /// Create a transaction id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as bytes, used as the storage key
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One applied donation, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    /// Transaction id this record was applied under
    pub txn_id: TxnId,
    /// Gross donation amount
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// When the ledger applied the donation
    pub applied_at: DateTime<Utc>,
}

/// Running aggregates maintained alongside the records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Sum of all applied donation amounts
    #[serde(with = "rust_decimal::serde::str")]
    pub raised: Decimal,
    /// Number of applied donation records
    pub donation_count: u64,
}

/// Result of attempting to apply a donation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The donation was recorded and the total now includes it
    Applied {
        /// Total raised after this donation
        new_total: Decimal,
    },
    /// This transaction id was applied earlier; nothing changed
    AlreadyApplied,
    /// The donation was refused and no record was written
    Rejected {
        /// Why the ledger refused it
        reason: RejectReason,
    },
}

/// Why the ledger refused a donation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Amount was zero or negative
    NonPositiveAmount,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount => write!(f, "non-positive amount"),
        }
    }
}

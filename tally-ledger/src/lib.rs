//! # Tally Ledger
//!
//! Durable donation ledger with at-most-once application of payment
//! notifications and a running total that always matches the records
//! on disk.
//!
//! ## Architecture
//!
//! - **Single Writer**: all mutations go through one actor task, so a
//!   duplicate check and the insert it guards form one serialized
//!   operation
//! - **Atomic Apply**: each donation record and the updated totals
//!   commit in a single RocksDB write batch
//! - **Direct Reads**: queries read storage directly and never wait
//!   behind the write path
//!
//! ## Invariants
//!
//! - The stored total equals the sum of all applied donation records
//! - A transaction id is applied at most once, no matter how often it
//!   is redelivered
//! - Records are never updated or deleted once written

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use storage::Storage;
pub use types::{ApplyOutcome, DonationRecord, LedgerTotals, RejectReason, TxnId};

//! Public facade for the donation ledger
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use tally_ledger::{Config, Ledger, TxnId};
//!
//! #[tokio::main]
//! async fn main() -> tally_ledger::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let outcome = ledger
//!         .try_apply(TxnId::new("61E67681CH3238416"), Decimal::new(2500, 2))
//!         .await?;
//!     println!("outcome: {outcome:?}");
//!     println!("raised:  {}", ledger.current_total()?);
//!
//!     ledger.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::actor::{spawn_ledger_actor, LedgerHandle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::storage::Storage;
use crate::types::{ApplyOutcome, DonationRecord, LedgerTotals, TxnId};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// The donation ledger: durable totals with at-most-once application
pub struct Ledger {
    handle: LedgerHandle,
    // Direct storage access (for reads)
    storage: Arc<Storage>,
    metrics: Metrics,
}

impl Ledger {
    /// Open the ledger and start its writer task
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);

        if config.verify_on_open {
            let stored = storage.totals()?;
            let recomputed = storage.recompute_totals()?;
            if stored != recomputed {
                return Err(Error::InvariantViolation(format!(
                    "Stored totals {stored:?} disagree with records {recomputed:?}"
                )));
            }
            tracing::info!(
                raised = %stored.raised,
                donation_count = stored.donation_count,
                "Ledger totals verified against records"
            );
        }

        let metrics = Metrics::new()?;
        let handle = spawn_ledger_actor(
            storage.clone(),
            config.durability.sync_writes,
            metrics.clone(),
        );

        Ok(Self {
            handle,
            storage,
            metrics,
        })
    }

    /// Apply a donation unless its transaction id was applied before.
    ///
    /// Returns once the outcome is durable. Errors mean the store could
    /// not answer and the caller must not acknowledge the notification.
    pub async fn try_apply(&self, txn_id: TxnId, amount: Decimal) -> Result<ApplyOutcome> {
        self.handle.try_apply(txn_id, amount).await
    }

    /// Total raised so far
    pub fn current_total(&self) -> Result<Decimal> {
        Ok(self.storage.totals()?.raised)
    }

    /// Current totals including the donation count
    pub fn stats(&self) -> Result<LedgerTotals> {
        self.storage.totals()
    }

    /// Look up the record applied under a transaction id
    pub fn donation(&self, txn_id: &TxnId) -> Result<Option<DonationRecord>> {
        self.storage.donation(txn_id)
    }

    /// Whether the stored totals match a full scan of the records
    pub fn check_accounting_identity(&self) -> Result<bool> {
        Ok(self.storage.totals()? == self.storage.recompute_totals()?)
    }

    /// Ledger metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Stop the writer task and wait for the database to be released
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger").finish_non_exhaustive()
    }
}

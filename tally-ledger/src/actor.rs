//! Single-writer actor for the donation ledger
//!
//! All mutations flow through one task owning the write path:
//! - The duplicate check and the insert it guards run on the same
//!   task, so no interleaving can apply a transaction id twice
//! - Writes are durable before the outcome is sent back
//! - Reads do not go through the mailbox; see [`crate::Ledger`]

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::storage::Storage;
use crate::types::{ApplyOutcome, DonationRecord, RejectReason, TxnId};
use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Messages processed by the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Apply a donation unless its transaction id was seen before
    TryApply {
        /// Processor-assigned transaction id
        txn_id: TxnId,
        /// Gross donation amount
        amount: Decimal,
        /// Channel for the outcome
        response: oneshot::Sender<Result<ApplyOutcome>>,
    },
    /// Stop the actor and release the database
    Shutdown {
        /// Acked once storage is dropped
        response: oneshot::Sender<()>,
    },
}

/// The single-writer actor owning all ledger mutations
pub struct LedgerActor {
    storage: Arc<Storage>,
    mailbox: mpsc::Receiver<LedgerMessage>,
    sync_writes: bool,
    metrics: Metrics,
}

impl LedgerActor {
    /// Create a new actor draining the given mailbox
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        sync_writes: bool,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            sync_writes,
            metrics,
        }
    }

    /// Run the actor until shutdown or all handles are dropped
    pub async fn run(mut self) {
        tracing::info!("Ledger actor started");
        let mut shutdown_ack = None;

        while let Some(message) = self.mailbox.recv().await {
            match message {
                LedgerMessage::TryApply {
                    txn_id,
                    amount,
                    response,
                } => {
                    let started = Instant::now();
                    let result = self.try_apply(txn_id, amount);
                    self.metrics
                        .record_apply(&result, started.elapsed().as_secs_f64());
                    let _ = response.send(result);
                }
                LedgerMessage::Shutdown { response } => {
                    shutdown_ack = Some(response);
                    break;
                }
            }
        }

        drop(self.storage);
        tracing::info!("Ledger actor stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    /// Apply one donation.
    ///
    /// Runs only on this actor task; nothing else writes, so the check
    /// and the insert form one serialized operation.
    fn try_apply(&self, txn_id: TxnId, amount: Decimal) -> Result<ApplyOutcome> {
        if self.storage.is_applied(&txn_id)? {
            tracing::debug!(txn_id = %txn_id, "Duplicate notification, nothing applied");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        if amount <= Decimal::ZERO {
            tracing::warn!(txn_id = %txn_id, amount = %amount, "Rejected non-positive amount");
            return Ok(ApplyOutcome::Rejected {
                reason: RejectReason::NonPositiveAmount,
            });
        }

        let mut totals = self.storage.totals()?;
        totals.raised = totals
            .raised
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow(txn_id.to_string()))?;
        totals.donation_count += 1;

        let record = DonationRecord {
            txn_id,
            amount,
            applied_at: Utc::now(),
        };
        self.storage
            .apply_donation(&record, &totals, self.sync_writes)?;

        Ok(ApplyOutcome::Applied {
            new_total: totals.raised,
        })
    }
}

impl fmt::Debug for LedgerActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerActor")
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}

/// Clonable handle for sending work to the ledger actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Apply a donation, waiting for the durable outcome
    pub async fn try_apply(&self, txn_id: TxnId, amount: Decimal) -> Result<ApplyOutcome> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(LedgerMessage::TryApply {
                txn_id,
                amount,
                response,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        receiver
            .await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Stop the actor and wait until it has released the database
    pub async fn shutdown(&self) -> Result<()> {
        let (response, receiver) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Shutdown { response })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        receiver
            .await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }
}

impl fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerHandle").finish_non_exhaustive()
    }
}

/// Spawn the ledger actor and return a handle to it
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    sync_writes: bool,
    metrics: Metrics,
) -> LedgerHandle {
    let (sender, receiver) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, receiver, sync_writes, metrics);
    tokio::spawn(actor.run());
    LedgerHandle { sender }
}

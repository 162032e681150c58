//! RocksDB-backed persistence for donation records and totals
//!
//! Column families:
//! - `applied`: one record per applied donation, keyed by transaction id
//! - `meta`: the running totals under a single fixed key
//!
//! A record and the updated totals always commit in one write batch,
//! so the accounting identity holds across crashes.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{DonationRecord, LedgerTotals, TxnId};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode, IteratorMode,
    MultiThreaded, Options, WriteBatch, WriteOptions,
};
use std::fmt;
use std::sync::Arc;

type DB = DBWithThreadMode<MultiThreaded>;

/// Column family for applied donation records
pub const CF_APPLIED: &str = "applied";
/// Column family for ledger metadata
pub const CF_META: &str = "meta";

const TOTALS_KEY: &[u8] = b"totals";

/// Storage engine for the donation ledger
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create the database at the configured path
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_APPLIED, Self::cf_options_applied()),
            ColumnFamilyDescriptor::new(CF_META, Self::cf_options_meta()),
        ];

        let db = DB::open_cf_descriptors(&opts, &config.data_dir, cf_descriptors)?;
        tracing::info!("Opened RocksDB at {:?}", config.data_dir);

        Ok(Self { db })
    }

    fn cf_options_applied() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(DBCompressionType::Lz4);
        opts
    }

    fn cf_options_meta() -> Options {
        let mut opts = Options::default();
        // One tiny value, compression buys nothing
        opts.set_compression_type(DBCompressionType::None);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {name} not found")))
    }

    /// Fetch the record applied under a transaction id, if any
    pub fn donation(&self, txn_id: &TxnId) -> Result<Option<DonationRecord>> {
        let cf = self.cf_handle(CF_APPLIED)?;
        match self.db.get_cf(&cf, txn_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether a transaction id has already been applied
    pub fn is_applied(&self, txn_id: &TxnId) -> Result<bool> {
        let cf = self.cf_handle(CF_APPLIED)?;
        Ok(self.db.get_pinned_cf(&cf, txn_id.as_bytes())?.is_some())
    }

    /// Current totals, zero on a fresh database
    pub fn totals(&self) -> Result<LedgerTotals> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(&cf, TOTALS_KEY)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(LedgerTotals::default()),
        }
    }

    /// Commit a donation record together with the totals that include it.
    ///
    /// With `sync` set, the batch is fsynced before this returns, so a
    /// crash after the call cannot lose the donation.
    pub fn apply_donation(
        &self,
        record: &DonationRecord,
        totals: &LedgerTotals,
        sync: bool,
    ) -> Result<()> {
        let applied_cf = self.cf_handle(CF_APPLIED)?;
        let meta_cf = self.cf_handle(CF_META)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&applied_cf, record.txn_id.as_bytes(), bincode::serialize(record)?);
        batch.put_cf(&meta_cf, TOTALS_KEY, bincode::serialize(totals)?);

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(sync);
        self.db.write_opt(batch, &write_opts)?;

        tracing::debug!(
            txn_id = %record.txn_id,
            amount = %record.amount,
            raised = %totals.raised,
            "Donation applied"
        );
        Ok(())
    }

    /// Recompute totals by scanning every applied record
    pub fn recompute_totals(&self) -> Result<LedgerTotals> {
        let cf = self.cf_handle(CF_APPLIED)?;
        let mut totals = LedgerTotals::default();

        for entry in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) = entry?;
            let record: DonationRecord = bincode::deserialize(&value)?;
            totals.raised = totals
                .raised
                .checked_add(record.amount)
                .ok_or_else(|| Error::Overflow(record.txn_id.to_string()))?;
            totals.donation_count += 1;
        }

        Ok(totals)
    }

    /// Close the database gracefully
    pub fn close(self) {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

//! Prometheus metrics for the ledger write path
//!
//! Exported series:
//! - `tally_donations_applied_total`
//! - `tally_donations_duplicate_total`
//! - `tally_donations_rejected_total`
//! - `tally_apply_errors_total`
//! - `tally_apply_duration_seconds`
//! - `tally_raised`

use crate::types::ApplyOutcome;
use prometheus::{
    register_gauge_with_registry, register_histogram_with_registry,
    register_int_counter_with_registry, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts,
    Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use std::fmt;
use std::sync::Arc;

/// Metrics for ledger apply operations
#[derive(Clone)]
pub struct Metrics {
    applied_total: IntCounter,
    duplicate_total: IntCounter,
    rejected_total: IntCounter,
    apply_errors_total: IntCounter,
    apply_duration: Histogram,
    raised: Gauge,
    registry: Arc<Registry>,
}

impl Metrics {
    /// Create metrics on a fresh registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let applied_total = register_int_counter_with_registry!(
            Opts::new("tally_donations_applied_total", "Donations applied"),
            registry
        )?;
        let duplicate_total = register_int_counter_with_registry!(
            Opts::new(
                "tally_donations_duplicate_total",
                "Redelivered notifications that changed nothing"
            ),
            registry
        )?;
        let rejected_total = register_int_counter_with_registry!(
            Opts::new("tally_donations_rejected_total", "Donations refused"),
            registry
        )?;
        let apply_errors_total = register_int_counter_with_registry!(
            Opts::new("tally_apply_errors_total", "Apply attempts that hit a storage error"),
            registry
        )?;
        let apply_duration = register_histogram_with_registry!(
            HistogramOpts::new(
                "tally_apply_duration_seconds",
                "Time to durably apply a donation"
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
            registry
        )?;
        let raised = register_gauge_with_registry!(
            Opts::new("tally_raised", "Total raised after the last apply"),
            registry
        )?;

        Ok(Self {
            applied_total,
            duplicate_total,
            rejected_total,
            apply_errors_total,
            apply_duration,
            raised,
            registry,
        })
    }

    /// Record one apply attempt and its duration
    pub fn record_apply(&self, result: &crate::Result<ApplyOutcome>, duration_seconds: f64) {
        self.apply_duration.observe(duration_seconds);
        match result {
            Ok(ApplyOutcome::Applied { new_total }) => {
                self.applied_total.inc();
                if let Some(raised) = new_total.to_f64() {
                    self.raised.set(raised);
                }
            }
            Ok(ApplyOutcome::AlreadyApplied) => self.duplicate_total.inc(),
            Ok(ApplyOutcome::Rejected { .. }) => self.rejected_total.inc(),
            Err(_) => self.apply_errors_total.inc(),
        }
    }

    /// Export all series in Prometheus text format
    pub fn export(&self) -> crate::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| crate::Error::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Metrics(e.to_string()))
    }

    /// The registry backing these metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

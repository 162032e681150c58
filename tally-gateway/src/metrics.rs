//! Prometheus metrics for the gateway

use crate::ipn::Disposition;
use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_with_registry, register_histogram_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Counter, Encoder,
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Gateway metrics
pub struct Metrics {
    registry: Registry,
    /// IPN posts received
    pub ipn_received: IntCounter,
    /// Notifications by terminal disposition
    pub ipn_outcomes: IntCounterVec,
    /// Dollar volume of applied donations
    pub donation_volume: Counter,
    /// Requests for the running total
    pub total_queries: IntCounter,
    /// Verification round-trip time
    pub verify_duration: Histogram,
    /// End-to-end IPN processing time
    pub ipn_duration: Histogram,
}

impl Metrics {
    /// Create metrics on a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let ipn_received = register_int_counter_with_registry!(
            Opts::new("tally_ipn_received_total", "IPN notifications received"),
            registry
        )?;
        let ipn_outcomes = register_int_counter_vec_with_registry!(
            Opts::new(
                "tally_ipn_outcomes_total",
                "IPN notifications by terminal disposition"
            ),
            &["disposition"],
            registry
        )?;
        let donation_volume = register_counter_with_registry!(
            Opts::new(
                "tally_donation_volume_total",
                "Dollar volume of applied donations"
            ),
            registry
        )?;
        let total_queries = register_int_counter_with_registry!(
            Opts::new("tally_total_queries_total", "Requests for the running total"),
            registry
        )?;
        let verify_duration = register_histogram_with_registry!(
            HistogramOpts::new(
                "tally_verify_duration_seconds",
                "Verification round-trip time"
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            registry
        )?;
        let ipn_duration = register_histogram_with_registry!(
            HistogramOpts::new(
                "tally_ipn_duration_seconds",
                "End-to-end IPN processing time"
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            registry
        )?;

        Ok(Self {
            registry,
            ipn_received,
            ipn_outcomes,
            donation_volume,
            total_queries,
            verify_duration,
            ipn_duration,
        })
    }

    /// Record a notification reaching its terminal disposition
    pub fn observe_disposition(&self, disposition: Disposition, duration_seconds: f64) {
        self.ipn_outcomes
            .with_label_values(&[disposition.as_str()])
            .inc();
        self.ipn_duration.observe(duration_seconds);
    }

    /// Record the amount of an applied donation
    pub fn observe_donation(&self, amount: Decimal) {
        if let Some(amount) = amount.to_f64() {
            self.donation_volume.inc_by(amount);
        }
    }

    /// Export all series in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// Global gateway metrics
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to create gateway metrics")));

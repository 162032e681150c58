//! # Tally Gateway
//!
//! HTTP surface for the donation tracker. Receives PayPal IPN
//! notifications, verifies each one back with PayPal, applies verified
//! donations to the ledger, and serves the running total.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod ipn;
pub mod metrics;
pub mod routes;
pub mod verifier;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tally_ledger::Ledger;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::verifier::IpnVerifier;

/// Shared state for all request handlers
#[derive(Clone)]
pub struct AppState {
    /// The donation ledger
    pub ledger: Arc<Ledger>,
    /// Client for the verification postback
    pub verifier: Arc<IpnVerifier>,
    /// Gateway configuration
    pub config: Arc<Config>,
}

/// Build the gateway router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/paypal/ipn", post(routes::handle_ipn))
        .route("/api/donations/total", get(routes::handle_total))
        .route("/health", get(routes::handle_health))
        .route("/metrics", get(routes::handle_metrics))
        .layer(cors)
        .with_state(state)
}

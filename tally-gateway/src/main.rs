//! Tally gateway service binary

use std::sync::Arc;
use tally_gateway::config::Config;
use tally_gateway::verifier::IpnVerifier;
use tally_gateway::{app, AppState};
use tally_ledger::Ledger;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    tracing::info!("🚀 Tally Gateway starting...");

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();

    let ledger = Arc::new(Ledger::open(config.ledger.clone()).await?);
    let verifier = Arc::new(IpnVerifier::new(
        config.paypal.verify_url(),
        config.paypal.verify_timeout,
    )?);
    tracing::info!("Verifying IPN messages against {}", verifier.verify_url());

    let state = AppState {
        ledger: ledger.clone(),
        verifier,
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("✅ Tally Gateway listening on {}", bind_addr);
    tracing::info!("   POST /api/paypal/ipn       - PayPal IPN listener");
    tracing::info!("   GET  /api/donations/total  - Running donation total");
    tracing::info!("   GET  /health               - Health check");
    tracing::info!("   GET  /metrics              - Prometheus metrics");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ledger.shutdown().await?;
    tracing::info!("Tally Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

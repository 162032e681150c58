//! HTTP handlers for the gateway

use crate::error::GatewayError;
use crate::ipn::{Disposition, IpnNotification};
use crate::metrics::METRICS;
use crate::verifier::VerifyOutcome;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Instant;
use tally_ledger::ApplyOutcome;

/// Response body for the public total endpoint
#[derive(Debug, Serialize)]
pub struct TotalResponse {
    /// Total raised so far
    #[serde(with = "rust_decimal::serde::float")]
    pub raised: Decimal,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
    ledger_ok: bool,
    donation_count: u64,
}

/// Receive one IPN notification.
///
/// Every notification ends acknowledged with 200 whatever its
/// disposition; anything else makes PayPal redeliver and the dedup
/// logic would have to absorb the storm. The one exception is a ledger
/// store failure, where a 5xx asks PayPal to redeliver later.
pub async fn handle_ipn(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, GatewayError> {
    METRICS.ipn_received.inc();
    let started = Instant::now();

    let disposition = process_ipn(&state, &body).await?;

    METRICS.observe_disposition(disposition, started.elapsed().as_secs_f64());
    Ok(StatusCode::OK)
}

async fn process_ipn(state: &AppState, body: &[u8]) -> Result<Disposition, GatewayError> {
    let notification = match IpnNotification::parse(body) {
        Ok(notification) => notification,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding malformed IPN payload");
            return Ok(Disposition::Malformed);
        }
    };
    let txn_id = notification.txn_id.clone();

    let verify_started = Instant::now();
    let verify_outcome = state.verifier.verify(body).await;
    METRICS
        .verify_duration
        .observe(verify_started.elapsed().as_secs_f64());

    match verify_outcome {
        VerifyOutcome::Verified => {}
        VerifyOutcome::NotVerified => {
            tracing::warn!(txn_id = %txn_id, "PayPal did not confirm notification");
            return Ok(Disposition::NotVerified);
        }
        VerifyOutcome::Unreachable(reason) => {
            tracing::warn!(
                txn_id = %txn_id,
                reason = %reason,
                "Verification authority unreachable, notification dropped"
            );
            return Ok(Disposition::AuthorityUnreachable);
        }
    }

    let amount = match notification.check_rules(&state.config.accepted_currency) {
        Ok(amount) => amount,
        Err(violation) => {
            tracing::info!(
                txn_id = %txn_id,
                violation = %violation,
                "Verified notification is not a countable donation"
            );
            return Ok(Disposition::RuleViolation);
        }
    };

    match state.ledger.try_apply(txn_id.clone(), amount).await? {
        ApplyOutcome::Applied { new_total } => {
            tracing::info!(txn_id = %txn_id, amount = %amount, raised = %new_total, "Donation applied");
            METRICS.observe_donation(amount);
            Ok(Disposition::Applied)
        }
        ApplyOutcome::AlreadyApplied => {
            tracing::info!(txn_id = %txn_id, "Duplicate notification acknowledged");
            Ok(Disposition::Duplicate)
        }
        ApplyOutcome::Rejected { reason } => {
            tracing::warn!(txn_id = %txn_id, reason = %reason, "Ledger refused donation");
            Ok(Disposition::StoreRejected)
        }
    }
}

/// Serve the running donation total
pub async fn handle_total(
    State(state): State<AppState>,
) -> Result<Json<TotalResponse>, GatewayError> {
    METRICS.total_queries.inc();
    let raised = state.ledger.current_total()?;
    Ok(Json(TotalResponse { raised }))
}

/// Health check
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.ledger.stats();
    let ledger_ok = stats.is_ok();

    Json(HealthResponse {
        status: if ledger_ok { "healthy" } else { "degraded" }.to_string(),
        service: "tally-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger_ok,
        donation_count: stats.map(|s| s.donation_count).unwrap_or(0),
    })
}

/// Prometheus metrics for the gateway and the ledger
pub async fn handle_metrics(State(state): State<AppState>) -> Result<String, GatewayError> {
    let mut output = METRICS
        .export()
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    output.push_str(&state.ledger.metrics().export()?);
    Ok(output)
}

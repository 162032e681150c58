//! Gateway error types and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The ledger store could not answer. The one case where a
    /// notification is not acknowledged, so the processor redelivers.
    #[error("Ledger unavailable: {0}")]
    Ledger(#[from] tally_ledger::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Ledger(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            GatewayError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            GatewayError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        tracing::error!("Request failed: {}", message);

        let body = Json(serde_json::json!({
            "error": message,
            "timestamp": Utc::now()
        }));

        (status, body).into_response()
    }
}

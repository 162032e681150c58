//! End-to-end tests for the IPN flow
//!
//! A mock PayPal endpoint stands in for the verification authority and
//! requests run through the real router with a real ledger on a
//! temporary directory.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tally_gateway::config::Config;
use tally_gateway::verifier::IpnVerifier;
use tally_gateway::{app, AppState};
use tally_ledger::Ledger;
use tempfile::TempDir;
use tower::ServiceExt;

const VERIFY_PATH: &str = "/cgi-bin/webscr";

async fn test_state(verify_url: String) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.ledger.data_dir = dir.path().to_path_buf();
    config.ledger.durability.sync_writes = false;
    config.paypal.verify_url_override = Some(verify_url);
    config.paypal.verify_timeout = Duration::from_secs(1);

    let ledger = Arc::new(Ledger::open(config.ledger.clone()).await.unwrap());
    let verifier = Arc::new(
        IpnVerifier::new(config.paypal.verify_url(), config.paypal.verify_timeout).unwrap(),
    );

    let state = AppState {
        ledger,
        verifier,
        config: Arc::new(config),
    };
    (state, dir)
}

fn completed_payload(txn_id: &str, gross: &str) -> String {
    format!(
        "mc_gross={gross}&payment_status=Completed&mc_currency=USD&txn_id={txn_id}\
         &payer_email=donor%40example.com&receiver_email=tally%40example.org"
    )
}

fn ipn_request(payload: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/paypal/ipn")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn total_request() -> Request<Body> {
    Request::builder()
        .uri("/api/donations/total")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_completed_donation_counts_and_redelivery_does_not() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    // A completed $25 donation counts
    let t1 = completed_payload("61E67681CH3238416", "25.00");
    let response = app.clone().oneshot(ipn_request(&t1)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 25.0}));

    // PayPal redelivers the same notification; the total must not move
    let response = app.clone().oneshot(ipn_request(&t1)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 25.0}));

    // A pending payment is acknowledged but never counted
    let pending = "mc_gross=10.00&payment_status=Pending&mc_currency=USD&txn_id=8XY12345AB6789012";
    let response = app.clone().oneshot(ipn_request(pending)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 25.0}));
}

#[tokio::test]
async fn test_postback_echoes_raw_payload() {
    let server = MockServer::start_async().await;
    let payload = completed_payload("3FH77421LL5566778", "5.00");
    let expected_postback = format!("cmd=_notify-validate&{payload}");

    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH).body(&expected_postback);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let response = app(state).oneshot(ipn_request(&payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unconfirmed_notification_not_counted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("INVALID");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    let payload = completed_payload("9KK33221DD4455667", "25.00");
    let response = app.clone().oneshot(ipn_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 0.0}));
}

#[tokio::test]
async fn test_unreachable_authority_acknowledged_not_counted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(500);
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    let payload = completed_payload("7AB55443EE2211009", "25.00");
    let response = app.clone().oneshot(ipn_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 0.0}));
}

#[tokio::test]
async fn test_wrong_currency_not_counted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    let payload = "mc_gross=25.00&payment_status=Completed&mc_currency=EUR&txn_id=2GG88990FF1122334";
    let response = app.clone().oneshot(ipn_request(payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 0.0}));
}

#[tokio::test]
async fn test_negative_gross_not_counted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    let payload = completed_payload("5CC66778HH9900112", "-5.00");
    let response = app.clone().oneshot(ipn_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 0.0}));
}

#[tokio::test]
async fn test_malformed_payload_acknowledged_without_postback() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    let response = app
        .clone()
        .oneshot(ipn_request("payment_status=Completed&mc_currency=USD"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Nothing parseable means nothing to verify
    assert_eq!(mock.hits_async().await, 0);

    let response = app.oneshot(total_request()).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"raised": 0.0}));
}

#[tokio::test]
async fn test_store_unavailable_returns_503() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    state.ledger.shutdown().await.unwrap();
    let app = app(state);

    // With the writer gone the notification must not be acknowledged
    let payload = completed_payload("4DD55667JJ8899001", "25.00");
    let response = app.oneshot(ipn_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_reports_ledger_state() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    let payload = completed_payload("6EE77889KK0011223", "25.00");
    app.clone().oneshot(ipn_request(&payload)).await.unwrap();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "tally-gateway");
    assert_eq!(health["ledger_ok"], true);
    assert_eq!(health["donation_count"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint_exports_both_registries() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(VERIFY_PATH);
            then.status(200).body("VERIFIED");
        })
        .await;

    let (state, _dir) = test_state(server.url(VERIFY_PATH)).await;
    let app = app(state);

    let payload = completed_payload("1FF88990LL2233445", "25.00");
    app.clone().oneshot(ipn_request(&payload)).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("tally_ipn_received_total"));
    assert!(text.contains("tally_donations_applied_total"));
}

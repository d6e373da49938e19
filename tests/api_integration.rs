//! Integration tests for Bulkify API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API,
//! with the payment gateway and mail relay replaced by in-memory mocks.

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::json;

use bulkify::adapters::notification::mock::MockNotifier;
use bulkify::adapters::payment::mock::MockPaymentGateway;
use bulkify::api::{AppState, router};
use bulkify::engine::Engine;
use bulkify::storage::Store;

const ANCHOR_LON: f64 = 31.0;
const ANCHOR_LAT: f64 = 30.0;

struct TestApp {
    server: TestServer,
    store: Store,
    payments: Arc<MockPaymentGateway>,
}

async fn create_test_app() -> TestApp {
    let store = Store::new("sqlite::memory:").await.unwrap();
    let payments = Arc::new(MockPaymentGateway::new());
    let notifier = Arc::new(MockNotifier::new());

    let engine = Engine::new(
        store.clone(),
        payments.clone(),
        notifier,
        "http://localhost:3000",
        "http://localhost:3000/cancelled",
    );

    let server = TestServer::new(router(AppState { engine })).unwrap();
    TestApp {
        server,
        store,
        payments,
    }
}

async fn seed_product(app: &TestApp, bulk_threshold: i64) {
    app.server
        .post("/products")
        .json(&json!({
            "id": "prod-1",
            "name": "Rice 25kg",
            "price_cents": 120000,
            "bulk_threshold": bulk_threshold,
            "supplier_id": "sup-1"
        }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

fn start_body(customer: &str, quantity: i64, lon: f64, lat: f64) -> serde_json::Value {
    json!({
        "customer_id": customer,
        "customer_email": format!("{customer}@example.com"),
        "quantity": quantity,
        "customer_location": [lon, lat]
    })
}

fn join_body(customer: &str, quantity: i64, lon: f64, lat: f64) -> serde_json::Value {
    json!({
        "product_id": "prod-1",
        "customer_id": customer,
        "customer_email": format!("{customer}@example.com"),
        "quantity": quantity,
        "customer_location": [lon, lat]
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_start_campaign_returns_checkout_session() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    let response = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-a", 6, ANCHOR_LON, ANCHOR_LAT))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Please complete your payment");
    assert!(body["session_url"].as_str().unwrap().starts_with("https://"));
    assert!(!body["campaign_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_campaign_unknown_product() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/products/missing/campaigns")
        .json(&start_body("cust-a", 1, ANCHOR_LON, ANCHOR_LAT))
        .await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_campaign_malformed_location() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    let response = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&json!({
            "customer_id": "cust-a",
            "customer_email": "cust-a@example.com",
            "quantity": 2,
            "customer_location": [31.0]
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_campaign_completion_flow() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    // Customer A starts with 6 units and pays
    let start: serde_json::Value = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-a", 6, ANCHOR_LON, ANCHOR_LAT))
        .await
        .json();
    let campaign_id = start["campaign_id"].as_str().unwrap().to_string();

    app.server
        .get(&format!("/campaigns/{campaign_id}/confirm/cust-a"))
        .await
        .assert_status_ok();

    // Listing shows one active campaign with 6 committed
    let listing: serde_json::Value = app
        .server
        .get("/products/prod-1/campaigns?lon=31.0&lat=30.0")
        .await
        .json();
    assert_eq!(listing["campaigns"].as_array().unwrap().len(), 1);
    assert_eq!(listing["campaigns"][0]["committed_quantity"], 6);
    assert_eq!(listing["campaigns"][0]["status"], "Started");

    // Customer B joins with 4 units from ~15 m away and pays
    let join: serde_json::Value = app
        .server
        .post(&format!("/campaigns/{campaign_id}/votes"))
        .json(&join_body("cust-b", 4, 31.0001, 30.0001))
        .await
        .json();
    let commitment_id = join["commitment_id"].as_str().unwrap().to_string();

    app.server
        .get(&format!(
            "/campaigns/{campaign_id}/votes/confirm/cust-b/{commitment_id}"
        ))
        .await
        .assert_status_ok();

    // 6 + 4 == 10: the campaign completed and left the active listing
    let listing: serde_json::Value = app
        .server
        .get("/products/prod-1/campaigns")
        .await
        .json();
    assert!(listing["campaigns"].as_array().unwrap().is_empty());

    let campaign = app.store.get_campaign(&campaign_id).await.unwrap().unwrap();
    assert_eq!(campaign.status.as_str(), "Completed");
    for commitment in app.store.commitments_for_campaign(&campaign_id).await.unwrap() {
        assert_eq!(commitment.status.as_str(), "Completed");
    }
}

#[tokio::test]
async fn test_nearby_start_is_rejected() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    let start: serde_json::Value = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-a", 6, ANCHOR_LON, ANCHOR_LAT))
        .await
        .json();
    let campaign_id = start["campaign_id"].as_str().unwrap();
    app.server
        .get(&format!("/campaigns/{campaign_id}/confirm/cust-a"))
        .await
        .assert_status_ok();

    // ~1 km away: conflict
    let response = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-c", 3, 31.0104, ANCHOR_LAT))
        .await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);

    // ~3 km away: allowed
    let response = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-d", 3, 31.0311, ANCHOR_LAT))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn test_over_capacity_join_is_rejected() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    let start: serde_json::Value = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-a", 8, ANCHOR_LON, ANCHOR_LAT))
        .await
        .json();
    let campaign_id = start["campaign_id"].as_str().unwrap().to_string();
    app.server
        .get(&format!("/campaigns/{campaign_id}/confirm/cust-a"))
        .await
        .assert_status_ok();

    // 8 committed + 3 > 10
    let response = app
        .server
        .post(&format!("/campaigns/{campaign_id}/votes"))
        .json(&join_body("cust-d", 3, 31.0001, 30.0001))
        .await;
    response.assert_status(axum::http::StatusCode::CONFLICT);

    // 8 + 2 == 10 fits
    let response = app
        .server
        .post(&format!("/campaigns/{campaign_id}/votes"))
        .json(&join_body("cust-d", 2, 31.0001, 30.0001))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_cancellation_with_refund_failure() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    let start: serde_json::Value = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-a", 6, ANCHOR_LON, ANCHOR_LAT))
        .await
        .json();
    let campaign_id = start["campaign_id"].as_str().unwrap().to_string();
    let commitment_id = start["commitment_id"].as_str().unwrap().to_string();
    app.server
        .get(&format!("/campaigns/{campaign_id}/confirm/cust-a"))
        .await
        .assert_status_ok();

    // Provider declines the refund: cancellation must not proceed
    app.payments.fail_refunds(true);
    let response = app
        .server
        .post(&format!("/commitments/{commitment_id}/cancel"))
        .json(&json!({ "customer_id": "cust-a", "reason": "moved away" }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);

    let commitment = app.store.get_commitment(&commitment_id).await.unwrap().unwrap();
    assert_eq!(commitment.status.as_str(), "Pending");

    // Provider recovers: cancellation refunds and folds the campaign
    app.payments.fail_refunds(false);
    let response = app
        .server
        .post(&format!("/commitments/{commitment_id}/cancel"))
        .json(&json!({ "customer_id": "cust-a", "reason": "moved away" }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["refund_status"], "refunded");
    assert_eq!(body["refund_amount_cents"], 6 * 120000);
    assert_eq!(body["campaign_cancelled"], true);
}

#[tokio::test]
async fn test_listing_sweeps_expired_campaigns() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    // A campaign whose 14-day window closed a week ago
    let old = app
        .store
        .create_campaign(
            "prod-1",
            [ANCHOR_LON, ANCHOR_LAT],
            10,
            Utc::now() - Duration::days(21),
        )
        .await
        .unwrap();

    let listing: serde_json::Value = app
        .server
        .get("/products/prod-1/campaigns")
        .await
        .json();
    assert_eq!(listing["swept"], 1);
    assert!(listing["campaigns"].as_array().unwrap().is_empty());

    let campaign = app.store.get_campaign(&old.id).await.unwrap().unwrap();
    assert_eq!(campaign.status.as_str(), "Ended without purchase");

    // A second read has nothing left to sweep
    let listing: serde_json::Value = app
        .server
        .get("/products/prod-1/campaigns")
        .await
        .json();
    assert_eq!(listing["swept"], 0);
}

#[tokio::test]
async fn test_cancel_requires_ownership() {
    let app = create_test_app().await;
    seed_product(&app, 10).await;

    let start: serde_json::Value = app
        .server
        .post("/products/prod-1/campaigns")
        .json(&start_body("cust-a", 6, ANCHOR_LON, ANCHOR_LAT))
        .await
        .json();
    let commitment_id = start["commitment_id"].as_str().unwrap();

    let response = app
        .server
        .post(&format!("/commitments/{commitment_id}/cancel"))
        .json(&json!({ "customer_id": "cust-b" }))
        .await;
    response.assert_status(axum::http::StatusCode::FORBIDDEN);
}

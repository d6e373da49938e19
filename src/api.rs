//! HTTP API handlers for Bulkify.
//!
//! The HTTP layer is a thin translation: request bodies in, engine
//! operations, `CoreError` variants out as status codes. All campaign
//! semantics live in [`crate::engine`].
//!
//! The two `confirm` endpoints are the payment provider's success-redirect
//! targets and may be hit more than once per payment; the engine treats
//! replays as successes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::engine::Engine;
use crate::error::CoreError;
use crate::model::{
    CampaignListResponse, CancelCommitmentRequest, CancellationResponse, CheckoutResponse,
    JoinCampaignRequest, Product, StartCampaignRequest,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/products", post(create_product))
        .route(
            "/products/:product_id/campaigns",
            post(start_campaign).get(list_campaigns),
        )
        .route(
            "/campaigns/:campaign_id/confirm/:customer_id",
            get(confirm_start_payment),
        )
        .route("/campaigns/:campaign_id/votes", post(join_campaign))
        .route(
            "/campaigns/:campaign_id/votes/confirm/:customer_id/:commitment_id",
            get(confirm_join_payment),
        )
        .route("/commitments/:commitment_id/cancel", post(cancel_commitment))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /products - Seed a product into the catalog.
///
/// The catalog proper (supplier CRUD, images, reviews) lives outside this
/// service; this endpoint exists so campaigns have something to run against.
#[instrument(skip(state, product), fields(product_id = %product.id))]
pub async fn create_product(
    State(state): State<AppState>,
    Json(product): Json<Product>,
) -> Result<impl IntoResponse, CoreError> {
    state.engine.store().insert_product(&product).await?;
    info!(product_id = %product.id, bulk_threshold = product.bulk_threshold, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// POST /products/:product_id/campaigns - Start a bulk-purchase campaign.
///
/// # Response
///
/// `201 Created` with the payment session URL the customer must complete:
///
/// ```json
/// {
///     "message": "Please complete your payment",
///     "session_url": "https://...",
///     "campaign_id": "...",
///     "commitment_id": "..."
/// }
/// ```
#[instrument(skip(state, request), fields(customer_id = %request.customer_id))]
pub async fn start_campaign(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(request): Json<StartCampaignRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let handle = state.engine.start_campaign(&product_id, &request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Please complete your payment".to_string(),
            session_url: handle.session.session_url,
            campaign_id: handle.campaign.id,
            commitment_id: handle.commitment.id,
        }),
    ))
}

/// GET /campaigns/:campaign_id/confirm/:customer_id - Start-payment success
/// callback. Idempotent under provider retries.
#[instrument(skip(state))]
pub async fn confirm_start_payment(
    State(state): State<AppState>,
    Path((campaign_id, customer_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, CoreError> {
    state
        .engine
        .confirm_start_payment(&campaign_id, &customer_id)
        .await?;

    Ok(Json(json!({ "message": "Payment confirmed" })))
}

/// POST /campaigns/:campaign_id/votes - Join an existing campaign.
#[instrument(skip(state, request), fields(customer_id = %request.customer_id))]
pub async fn join_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    Json(request): Json<JoinCampaignRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let handle = state.engine.join_campaign(&campaign_id, &request).await?;

    Ok(Json(CheckoutResponse {
        message: "Please complete your payment".to_string(),
        session_url: handle.session.session_url,
        campaign_id: handle.campaign.id,
        commitment_id: handle.commitment.id,
    }))
}

/// GET /campaigns/:campaign_id/votes/confirm/:customer_id/:commitment_id -
/// Join-payment success callback. Completes the campaign when the paid
/// tally reaches the target.
#[instrument(skip(state))]
pub async fn confirm_join_payment(
    State(state): State<AppState>,
    Path((campaign_id, customer_id, commitment_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, CoreError> {
    state
        .engine
        .confirm_join_payment(&campaign_id, &customer_id, &commitment_id)
        .await?;

    Ok(Json(json!({ "message": "Payment confirmed" })))
}

/// POST /commitments/:commitment_id/cancel - Cancel a commitment, refunding
/// a captured payment first. A declined refund aborts the cancellation.
#[instrument(skip(state, request), fields(customer_id = %request.customer_id))]
pub async fn cancel_commitment(
    State(state): State<AppState>,
    Path(commitment_id): Path<String>,
    Json(request): Json<CancelCommitmentRequest>,
) -> Result<Json<CancellationResponse>, CoreError> {
    let response = state
        .engine
        .cancel_commitment(&commitment_id, &request.customer_id, request.reason.as_deref())
        .await?;

    Ok(Json(response))
}

/// Query parameters for the campaign listing.
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    /// Customer longitude, for distance annotation.
    pub lon: Option<f64>,
    /// Customer latitude.
    pub lat: Option<f64>,
}

/// GET /products/:product_id/campaigns - Active campaigns for a product.
///
/// Runs the expiry sweep first, so the listing never contains campaigns
/// whose window already closed. With `?lon=&lat=` each entry carries the
/// caller's distance from the campaign anchor.
#[instrument(skip(state))]
pub async fn list_campaigns(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignListResponse>, CoreError> {
    let location = match (query.lon, query.lat) {
        (Some(lon), Some(lat)) => Some([lon, lat]),
        _ => None,
    };

    let response = state
        .engine
        .list_active_campaigns(&product_id, location)
        .await?;

    info!(
        product_id,
        campaigns = response.campaigns.len(),
        swept = response.swept,
        "Campaigns listed"
    );
    Ok(Json(response))
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

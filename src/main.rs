//! Bulkify - a group-buying marketplace backend.
//!
//! # API Endpoints
//!
//! - `POST /products` - Seed a product
//! - `POST /products/:product_id/campaigns` - Start a campaign
//! - `GET  /products/:product_id/campaigns` - List active campaigns (swept first)
//! - `POST /campaigns/:campaign_id/votes` - Join a campaign
//! - `GET  /campaigns/:campaign_id/confirm/:customer_id` - Start-payment callback
//! - `GET  /campaigns/:campaign_id/votes/confirm/:customer_id/:commitment_id` - Join-payment callback
//! - `POST /commitments/:commitment_id/cancel` - Cancel a commitment
//! - `GET  /health` - Health check

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use bulkify::adapters::{HttpMailer, StripeCheckout};
use bulkify::api::{AppState, router};
use bulkify::engine::Engine;
use bulkify::storage::Store;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:bulkify.db?mode=rwc";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("bulkify=info".parse()?))
        .init();

    // Load configuration from environment
    let port: u16 = env::var("BULKIFY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let db_url = env::var("BULKIFY_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    let stripe_key = env::var("STRIPE_SECRET_KEY")
        .map_err(|_| anyhow::anyhow!("STRIPE_SECRET_KEY must be set"))?;
    let mail_relay_url = env::var("MAIL_RELAY_URL")
        .map_err(|_| anyhow::anyhow!("MAIL_RELAY_URL must be set"))?;
    let callback_base_url = env::var("BULKIFY_CALLBACK_BASE_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));
    let checkout_cancel_url = env::var("BULKIFY_CHECKOUT_CANCEL_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));

    info!(port, db_url = %db_url, "Starting Bulkify server");

    // Initialize storage
    let store = Store::new(&db_url).await?;
    info!("Database initialized");

    let engine = Engine::new(
        store,
        Arc::new(StripeCheckout::new(&stripe_key)),
        Arc::new(HttpMailer::new(&mail_relay_url)),
        &callback_base_url,
        &checkout_cancel_url,
    );

    let app = router(AppState { engine });

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Bulkify is listening");

    axum::serve(listener, app).await?;

    Ok(())
}

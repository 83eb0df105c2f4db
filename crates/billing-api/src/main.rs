//! PressReady Billing API
//!
//! REST API for plan lookup, billing sessions, webhooks and export

use anyhow::{Context, Result};
use billing_api::{create_router, AppState, ClerkClient, Config, RedisStorage, StripeClient};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billing_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting PressReady Billing API");
    info!("Redis URL: {}", config.redis_url);
    info!("App origin: {}", config.app_origin);

    if !config.billing_configured() {
        warn!("STRIPE_SECRET_KEY or STRIPE_PRO_PRICE_ID not set, checkout is disabled");
    }
    if config.stripe_webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET not set, webhooks will be refused");
    }

    // Initialize storage
    let storage = RedisStorage::new(&config.redis_url)
        .await
        .context("Failed to initialize storage")?;

    let billing = StripeClient::new(
        config.stripe_api_base.clone(),
        config.stripe_secret_key.clone(),
    );
    let identity = ClerkClient::new(&config.clerk_api_base, config.clerk_secret_key.clone());

    let addr = config.api_address();

    // Create application state
    let state = AppState {
        config,
        storage: Arc::new(storage),
        identity: Arc::new(identity),
        billing: Arc::new(billing),
    };

    // Create router
    let app = create_router(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Billing API running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

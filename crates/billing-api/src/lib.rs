//! PressReady Billing API
//!
//! Resolves a signed-in user's plan, starts checkout and billing portal
//! sessions, mirrors subscriptions from billing webhooks and serves the
//! plan-gated report export.

pub mod config;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod storage;
pub mod stripe;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::{ApiError, AppState};
pub use identity::{ClerkClient, IdentityVerifier};
pub use models::{Plan, SubscriptionRecord};
pub use storage::{MemoryStorage, RedisStorage, SubscriptionStore};
pub use stripe::{BillingProvider, StripeClient};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/plan", get(handlers::plan_handler))
        .route("/api/stripe/checkout", post(handlers::checkout_handler))
        .route("/api/stripe/portal", post(handlers::portal_handler))
        .route("/api/stripe/webhook", post(handlers::webhook_handler))
        .route("/api/export", post(handlers::export_handler))
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

//! API request handlers for the billing API

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use pressready_common::Error;
use pressready_core::Report;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    identity::{session_token, IdentityVerifier},
    models::{resolve_plan, Plan, PlanResponse, RedirectResponse, SubscriptionRecord, WebhookEvent},
    storage::SubscriptionStore,
    stripe::{verify_signature, BillingProvider, CheckoutRequest, SIGNATURE_HEADER},
    webhook::reconcile,
};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn SubscriptionStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub billing: Arc<dyn BillingProvider>,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Request failed: {:#}", err);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(_) | Error::UnsupportedFormat(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            Error::InvalidSignature => ApiError::new(StatusCode::BAD_REQUEST, "Invalid signature"),
            Error::Billing(msg) => {
                error!("Billing provider error: {}", msg);
                ApiError::new(StatusCode::BAD_GATEWAY, "Billing provider request failed")
            }
            Error::Identity(msg) => {
                error!("Identity provider error: {}", msg);
                ApiError::new(StatusCode::BAD_GATEWAY, "Identity provider request failed")
            }
            other => {
                error!("Request failed: {}", other);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

/// User id behind the request's session, if any
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<String>, Error> {
    match session_token(headers) {
        Some(token) => state.identity.verify_session(&token).await,
        None => Ok(None),
    }
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    authenticate(state, headers)
        .await?
        .ok_or_else(ApiError::unauthorized)
}

fn require_billing(config: &Config) -> Result<(), ApiError> {
    if config.billing_configured() {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Billing is not configured",
        ))
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "billing-api"
    }))
}

/// Plan of the current user; anything short of a live pro subscription is free
pub async fn plan_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<PlanResponse> {
    let free = PlanResponse {
        plan: Plan::Free,
        subscription: None,
    };

    let user_id = match authenticate(&state, &headers).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return Json(free),
        Err(e) => {
            warn!("Session verification failed: {}", e);
            return Json(free);
        }
    };

    match state.storage.get_by_user_id(&user_id).await {
        Ok(subscription) => Json(PlanResponse {
            plan: resolve_plan(subscription.as_ref()),
            subscription,
        }),
        Err(e) => {
            warn!("Subscription lookup failed for {}: {:#}", user_id, e);
            Json(free)
        }
    }
}

/// Start a pro checkout, creating the billing customer on first use
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RedirectResponse>, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    require_billing(&state.config)?;

    let existing = state.storage.get_by_user_id(&user_id).await?;
    let customer_id = match existing {
        Some(record) if !record.stripe_customer_id.is_empty() => record.stripe_customer_id,
        existing => {
            let customer = state.billing.create_customer(&user_id).await?;
            info!("Created billing customer {} for user {}", customer.id, user_id);

            let record = match existing {
                Some(record) => SubscriptionRecord {
                    stripe_customer_id: customer.id.clone(),
                    ..record
                },
                None => SubscriptionRecord::pending(user_id.clone(), customer.id.clone()),
            };
            state.storage.upsert(&record).await?;
            customer.id
        }
    };

    let origin = &state.config.app_origin;
    let session = state
        .billing
        .create_checkout_session(&CheckoutRequest {
            customer_id,
            user_id,
            success_url: format!("{}/account?checkout=success", origin),
            cancel_url: format!("{}/pricing?checkout=canceled", origin),
            price_id: state.config.stripe_pro_price_id.clone(),
        })
        .await?;

    Ok(Json(RedirectResponse { url: session.url }))
}

/// Open the billing portal for the current user's customer
pub async fn portal_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RedirectResponse>, ApiError> {
    let user_id = require_user(&state, &headers).await?;

    let customer_id = state
        .storage
        .get_by_user_id(&user_id)
        .await?
        .map(|record| record.stripe_customer_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No customer found"))?;

    let session = state
        .billing
        .create_portal_session(&customer_id, &format!("{}/account", state.config.app_origin))
        .await?;

    Ok(Json(RedirectResponse { url: session.url }))
}

/// Verify and reconcile a billing webhook delivery
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let secret = state.config.stripe_webhook_secret.as_deref().ok_or_else(|| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Billing webhooks are not configured",
        )
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing signature"))?;

    if let Err(e) = verify_signature(
        secret,
        &body,
        signature,
        Utc::now().timestamp(),
        state.config.webhook_tolerance_secs,
    ) {
        warn!("Rejected webhook: {}", e);
        return Err(Error::from(e).into());
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Malformed event"))?;

    let outcome = reconcile(&event, state.storage.as_ref(), state.billing.as_ref()).await?;
    info!("Webhook {} ({}): {:?}", event.id, event.event_type, outcome);

    Ok(Json(serde_json::json!({ "received": true })))
}

/// Plain-text export of a report, pro plan only
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(&state, &headers).await?;
    let report: Report = serde_json::from_slice(&body)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Malformed report"))?;

    let subscription = state.storage.get_by_user_id(&user_id).await?;
    if resolve_plan(subscription.as_ref()) != Plan::Pro {
        return Err(ApiError::new(
            StatusCode::PAYMENT_REQUIRED,
            "Export requires the Pro plan",
        ));
    }

    let text = report.rederive().render_export();
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    ))
}

//! Data models for the billing API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider statuses that unlock the pro plan
pub const ACTIVE_STATUSES: [&str; 2] = ["active", "trialing"];

/// Status mirrored for a customer that has not finished checkout yet
pub const INCOMPLETE_STATUS: &str = "incomplete";

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
}

/// Subscription mirrored from the billing provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Identity provider user id
    pub user_id: String,

    pub stripe_customer_id: String,

    #[serde(default)]
    pub stripe_subscription_id: Option<String>,

    /// Provider status (`active`, `trialing`, `past_due`, `canceled`, ...)
    pub status: String,

    #[serde(default)]
    pub price_id: Option<String>,

    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl SubscriptionRecord {
    /// Record for a customer created ahead of checkout
    pub fn pending(user_id: String, stripe_customer_id: String) -> Self {
        Self {
            user_id,
            stripe_customer_id,
            stripe_subscription_id: None,
            status: INCOMPLETE_STATUS.to_string(),
            price_id: None,
            current_period_end: None,
            cancel_at_period_end: false,
        }
    }

    /// Mirror a provider subscription for a user
    pub fn from_provider(user_id: String, subscription: &ProviderSubscription) -> Self {
        Self {
            user_id,
            stripe_customer_id: subscription.customer.clone(),
            stripe_subscription_id: Some(subscription.id.clone()),
            status: subscription.status.clone(),
            price_id: subscription.price_id(),
            current_period_end: subscription
                .current_period_end
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            cancel_at_period_end: subscription.cancel_at_period_end,
        }
    }

    pub fn is_active(&self) -> bool {
        ACTIVE_STATUSES.contains(&self.status.as_str())
    }
}

/// Plan granted by an optional subscription
pub fn resolve_plan(subscription: Option<&SubscriptionRecord>) -> Plan {
    match subscription {
        Some(s) if s.is_active() => Plan::Pro,
        _ => Plan::Free,
    }
}

// ---------------------------------------------------------------------------
// Billing provider objects
// ---------------------------------------------------------------------------

/// Customer object returned by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCustomer {
    pub id: String,
}

/// Subscription object as sent by the provider, in API responses and webhooks
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub items: SubscriptionItems,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderSubscription {
    pub fn price_id(&self) -> Option<String> {
        self.items.data.first().map(|item| item.price.id.clone())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get("user_id").map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
}

/// Completed checkout session as sent in `checkout.session.completed`
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCheckoutSession {
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Redirect returned by checkout and portal session creation
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    #[serde(default)]
    pub url: Option<String>,
}

/// Webhook envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

// ---------------------------------------------------------------------------
// API responses
// ---------------------------------------------------------------------------

/// `GET /api/plan` response
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan: Plan,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionRecord>,
}

/// Checkout and portal responses
#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: Option<String>,
}

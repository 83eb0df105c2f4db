//! Webhook event reconciliation
//!
//! Verified events are folded into the subscription mirror. Only the event
//! types that change a user's plan are handled; everything else is ignored.

use crate::models::{
    ProviderCheckoutSession, ProviderSubscription, SubscriptionRecord, WebhookEvent,
};
use crate::storage::SubscriptionStore;
use crate::stripe::BillingProvider;
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// What an event did to the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Upserted { user_id: String },
    Deleted { subscription_id: String, removed: bool },
    /// The event could not be tied to a user
    Unmatched,
    Ignored,
}

/// Apply a verified webhook event to the subscription store
pub async fn reconcile(
    event: &WebhookEvent,
    storage: &dyn SubscriptionStore,
    billing: &dyn BillingProvider,
) -> Result<Reconciliation> {
    debug!("Reconciling event {} ({})", event.id, event.event_type);

    match event.event_type.as_str() {
        CHECKOUT_COMPLETED => {
            let session: ProviderCheckoutSession =
                serde_json::from_value(event.data.object.clone())
                    .context("Malformed checkout session")?;

            let Some(subscription_id) = session.subscription.as_deref() else {
                debug!("Checkout session without subscription, ignoring");
                return Ok(Reconciliation::Ignored);
            };

            let subscription = billing
                .fetch_subscription(subscription_id)
                .await
                .context("Failed to fetch subscription")?;

            let user_id = match session.metadata.get("user_id") {
                Some(id) if !id.is_empty() => Some(id.clone()),
                _ => resolve_user(&subscription, storage).await?,
            };
            mirror(user_id, &subscription, storage).await
        }
        SUBSCRIPTION_CREATED | SUBSCRIPTION_UPDATED => {
            let subscription: ProviderSubscription =
                serde_json::from_value(event.data.object.clone())
                    .context("Malformed subscription")?;

            let user_id = resolve_user(&subscription, storage).await?;
            mirror(user_id, &subscription, storage).await
        }
        SUBSCRIPTION_DELETED => {
            let subscription: ProviderSubscription =
                serde_json::from_value(event.data.object.clone())
                    .context("Malformed subscription")?;

            let removed = storage
                .delete_by_subscription_id(&subscription.id)
                .await?;
            Ok(Reconciliation::Deleted {
                subscription_id: subscription.id,
                removed,
            })
        }
        other => {
            debug!("Ignoring event type {}", other);
            Ok(Reconciliation::Ignored)
        }
    }
}

/// User owning a subscription: metadata first, then the mirrored customer
async fn resolve_user(
    subscription: &ProviderSubscription,
    storage: &dyn SubscriptionStore,
) -> Result<Option<String>> {
    if let Some(user_id) = subscription.user_id().filter(|id| !id.is_empty()) {
        return Ok(Some(user_id.to_string()));
    }

    Ok(storage
        .get_by_customer_id(&subscription.customer)
        .await?
        .map(|record| record.user_id))
}

async fn mirror(
    user_id: Option<String>,
    subscription: &ProviderSubscription,
    storage: &dyn SubscriptionStore,
) -> Result<Reconciliation> {
    let Some(user_id) = user_id else {
        warn!(
            "No user for subscription {} (customer {})",
            subscription.id, subscription.customer
        );
        return Ok(Reconciliation::Unmatched);
    };

    let record = SubscriptionRecord::from_provider(user_id.clone(), subscription);
    storage.upsert(&record).await?;

    info!(
        "Mirrored subscription {} for user {} ({})",
        subscription.id, user_id, subscription.status
    );
    Ok(Reconciliation::Upserted { user_id })
}

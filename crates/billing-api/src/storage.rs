//! Subscription storage
//!
//! Redis layout:
//! - `subscription:user:{user_id}` → JSON [`SubscriptionRecord`]
//! - `subscription:customer:{stripe_customer_id}` → user_id
//! - `subscription:stripe:{stripe_subscription_id}` → user_id

use crate::models::SubscriptionRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Store of mirrored subscriptions, one per user
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionRecord>>;

    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Option<SubscriptionRecord>>;

    /// Insert or replace the record for `subscription.user_id`
    async fn upsert(&self, subscription: &SubscriptionRecord) -> Result<()>;

    /// Returns whether a record was removed
    async fn delete_by_subscription_id(&self, subscription_id: &str) -> Result<bool>;
}

fn user_key(user_id: &str) -> String {
    format!("subscription:user:{}", user_id)
}

fn customer_key(customer_id: &str) -> String {
    format!("subscription:customer:{}", customer_id)
}

fn stripe_key(subscription_id: &str) -> String {
    format!("subscription:stripe:{}", subscription_id)
}

/// Redis-backed subscription store
pub struct RedisStorage {
    conn: ConnectionManager,
}

impl RedisStorage {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    async fn get_user_id(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let user_id: Option<String> = conn.get(key).await?;
        Ok(user_id)
    }
}

#[async_trait]
impl SubscriptionStore for RedisStorage {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(user_key(user_id)).await?;

        match json {
            Some(data) => {
                let record: SubscriptionRecord =
                    serde_json::from_str(&data).context("Failed to deserialize subscription")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Option<SubscriptionRecord>> {
        match self.get_user_id(&customer_key(customer_id)).await? {
            Some(user_id) => self.get_by_user_id(&user_id).await,
            None => Ok(None),
        }
    }

    async fn upsert(&self, subscription: &SubscriptionRecord) -> Result<()> {
        let mut conn = self.conn.clone();

        // Drop reverse lookups that point at ids this user no longer has
        if let Some(old) = self.get_by_user_id(&subscription.user_id).await? {
            if old.stripe_customer_id != subscription.stripe_customer_id {
                let _: () = conn.del(customer_key(&old.stripe_customer_id)).await?;
            }
            if let Some(old_sub) = old.stripe_subscription_id {
                if subscription.stripe_subscription_id.as_deref() != Some(old_sub.as_str()) {
                    let _: () = conn.del(stripe_key(&old_sub)).await?;
                }
            }
        }

        let json =
            serde_json::to_string(subscription).context("Failed to serialize subscription")?;
        let _: () = conn.set(user_key(&subscription.user_id), json).await?;
        let _: () = conn
            .set(
                customer_key(&subscription.stripe_customer_id),
                &subscription.user_id,
            )
            .await?;
        if let Some(sub_id) = &subscription.stripe_subscription_id {
            let _: () = conn.set(stripe_key(sub_id), &subscription.user_id).await?;
        }

        debug!(
            "Upserted subscription for user {} (status {})",
            subscription.user_id, subscription.status
        );
        Ok(())
    }

    async fn delete_by_subscription_id(&self, subscription_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();

        let Some(user_id) = self.get_user_id(&stripe_key(subscription_id)).await? else {
            debug!("No subscription mirrored for {}", subscription_id);
            return Ok(false);
        };

        if let Some(record) = self.get_by_user_id(&user_id).await? {
            let _: () = conn.del(customer_key(&record.stripe_customer_id)).await?;
        }
        let _: () = conn.del(stripe_key(subscription_id)).await?;
        let deleted: bool = conn.del(user_key(&user_id)).await?;

        if deleted {
            info!("Deleted subscription {} for user {}", subscription_id, user_id);
        }
        Ok(deleted)
    }
}

/// In-memory subscription store for tests and local runs without Redis
#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, SubscriptionRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStorage {
    async fn get_by_user_id(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
        Ok(self.records.lock().await.get(user_id).cloned())
    }

    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Option<SubscriptionRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .find(|r| r.stripe_customer_id == customer_id)
            .cloned())
    }

    async fn upsert(&self, subscription: &SubscriptionRecord) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(())
    }

    async fn delete_by_subscription_id(&self, subscription_id: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.stripe_subscription_id.as_deref() != Some(subscription_id));
        Ok(records.len() != before)
    }
}

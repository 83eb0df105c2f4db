//! Billing provider client and webhook signature verification
//!
//! Talks to a Stripe-compatible REST API with form-encoded requests. Only the
//! handful of calls PressReady needs are modelled.

use crate::models::{ProviderCustomer, ProviderSession, ProviderSubscription};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use pressready_common::{Error, Result};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use thiserror::Error as ThisError;
use tracing::debug;

/// Signature header sent with every webhook delivery
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default tolerance between the signed timestamp and now
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Parameters for a subscription checkout session
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub user_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub price_id: String,
}

impl CheckoutRequest {
    fn to_form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("customer", self.customer_id.clone()),
            ("mode", "subscription".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("line_items[0][price]", self.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[user_id]", self.user_id.clone()),
            ("subscription_data[metadata][user_id]", self.user_id.clone()),
        ]
    }
}

/// Billing provider operations used by the service
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(&self, user_id: &str) -> Result<ProviderCustomer>;

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<ProviderSession>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<ProviderSession>;

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription>;
}

/// HTTP client for the billing provider
pub struct StripeClient {
    base_url: String,
    secret_key: String,
    client: reqwest::Client,
}

impl StripeClient {
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
            client: reqwest::Client::new(),
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Billing(e.to_string()))?;

        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| Error::Billing(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Billing(format!(
                "request failed ({}): {}",
                status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Billing(format!("unexpected response: {}", e)))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, user_id: &str) -> Result<ProviderCustomer> {
        self.post("/customers", &[("metadata[user_id]", user_id.to_string())])
            .await
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<ProviderSession> {
        self.post("/checkout/sessions", &request.to_form()).await
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<ProviderSession> {
        self.post(
            "/billing_portal/sessions",
            &[
                ("customer", customer_id.to_string()),
                ("return_url", return_url.to_string()),
            ],
        )
        .await
    }

    async fn fetch_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription> {
        self.get(&format!("/subscriptions/{}", subscription_id)).await
    }
}

/// Why a webhook signature was refused
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    Malformed,

    #[error("signature timestamp is outside the tolerance window")]
    Expired,

    #[error("no signature matches the payload")]
    Mismatch,
}

impl From<SignatureError> for Error {
    fn from(_: SignatureError) -> Self {
        Error::InvalidSignature
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

/// Build a `t=...,v1=...` header for a payload
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Option<String> {
    let mac = signed_mac(secret, timestamp, payload)?;
    Some(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a webhook signature header against the raw payload.
///
/// The header carries one timestamp and one or more `v1` signatures; any
/// matching signature is accepted. Comparison is constant time. A tolerance
/// of zero disables the timestamp check. Returns the signed timestamp.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
    tolerance_secs: i64,
) -> std::result::Result<i64, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" if timestamp.is_none() => timestamp = Some(value),
            "v1" if !value.is_empty() => signatures.push(value),
            _ => {}
        }
    }

    let timestamp: i64 = timestamp
        .and_then(|t| t.parse().ok())
        .ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if tolerance_secs > 0 && now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let mac = signed_mac(secret, timestamp, payload).ok_or(SignatureError::Mismatch)?;
    let matched = signatures.iter().any(|candidate| match hex::decode(candidate) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });

    if matched {
        Ok(timestamp)
    } else {
        Err(SignatureError::Mismatch)
    }
}

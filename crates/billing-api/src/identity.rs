//! Identity provider session verification

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use pressready_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cookie the identity provider stores its session token in
pub const SESSION_COOKIE: &str = "__session";

/// Resolves a session token to a user id
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(None)` when the token is not a live session
    async fn verify_session(&self, token: &str) -> Result<Option<String>>;
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    user_id: Option<String>,
}

/// Client for the identity provider's session verification endpoint
pub struct ClerkClient {
    verify_url: String,
    secret_key: String,
    client: reqwest::Client,
}

impl ClerkClient {
    pub fn new(api_base: &str, secret_key: String) -> Self {
        Self {
            verify_url: format!("{}/sessions/verify", api_base.trim_end_matches('/')),
            secret_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for ClerkClient {
    async fn verify_session(&self, token: &str) -> Result<Option<String>> {
        if token.is_empty() {
            return Ok(None);
        }

        let response = self
            .client
            .post(&self.verify_url)
            .bearer_auth(&self.secret_key)
            .json(&VerifyRequest { token })
            .send()
            .await
            .map_err(|e| Error::Identity(e.to_string()))?;

        if !response.status().is_success() {
            debug!("Session rejected by identity provider: {}", response.status());
            return Ok(None);
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Identity(format!("unexpected response: {}", e)))?;

        Ok(body.user_id.filter(|id| !id.is_empty()))
    }
}

/// Session token from the session cookie, or from an `Authorization: Bearer` header
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, token)| *name == SESSION_COOKIE && !token.is_empty())
        .map(|(_, token)| token.to_string());

    from_cookie
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; __session=tok_123; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok_123"));
    }

    #[test]
    fn test_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok_456"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok_456"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("__session="));
        assert_eq!(session_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_empty_cookie_falls_back_to_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("__session=; theme=dark"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok_789"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok_789"));
    }

    #[tokio::test]
    async fn test_empty_token_skips_provider() {
        let client = ClerkClient::new("http://127.0.0.1:9", "sk_test".to_string());
        assert_eq!(client.verify_session("").await.unwrap(), None);
    }
}

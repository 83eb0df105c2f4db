//! Configuration management for the billing API
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::stripe::DEFAULT_TOLERANCE_SECS;
use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Redis URL for the subscription mirror
    pub redis_url: String,

    /// Public origin of the web app, used for checkout and portal redirects
    pub app_origin: String,

    /// Billing provider REST base URL
    pub stripe_api_base: String,

    pub stripe_secret_key: String,

    /// Webhook signing secret; webhooks are refused while unset
    pub stripe_webhook_secret: Option<String>,

    /// Price the pro plan checks out with
    pub stripe_pro_price_id: String,

    /// Identity provider REST base URL
    pub clerk_api_base: String,

    pub clerk_secret_key: String,

    /// Accepted clock skew for webhook signatures, 0 disables the check
    pub webhook_tolerance_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8084,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            app_origin: "http://localhost:3000".to_string(),
            stripe_api_base: "https://api.stripe.com/v1".to_string(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: None,
            stripe_pro_price_id: String::new(),
            clerk_api_base: "https://api.clerk.com/v1".to_string(),
            clerk_secret_key: String::new(),
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| defaults.api_port.to_string())
                .parse()
                .context("Invalid API_PORT")?,

            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),

            app_origin: env::var("APP_ORIGIN")
                .unwrap_or(defaults.app_origin)
                .trim_end_matches('/')
                .to_string(),

            stripe_api_base: env::var("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            stripe_pro_price_id: env::var("STRIPE_PRO_PRICE_ID").unwrap_or_default(),

            clerk_api_base: env::var("CLERK_API_BASE").unwrap_or(defaults.clerk_api_base),
            clerk_secret_key: env::var("CLERK_SECRET_KEY").unwrap_or_default(),

            webhook_tolerance_secs: env::var("WEBHOOK_TOLERANCE_SECS")
                .unwrap_or_else(|_| defaults.webhook_tolerance_secs.to_string())
                .parse()
                .context("Invalid WEBHOOK_TOLERANCE_SECS")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.webhook_tolerance_secs < 0 {
            anyhow::bail!("WEBHOOK_TOLERANCE_SECS cannot be negative");
        }

        if !self.app_origin.starts_with("http://") && !self.app_origin.starts_with("https://") {
            anyhow::bail!("APP_ORIGIN must be an http(s) URL");
        }

        Ok(())
    }

    /// Whether the billing provider credentials are present
    pub fn billing_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty() && !self.stripe_pro_price_id.is_empty()
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // Clear any existing environment variables
        env::remove_var("API_HOST");
        env::remove_var("API_PORT");
        env::remove_var("APP_ORIGIN");
        env::remove_var("WEBHOOK_TOLERANCE_SECS");
        env::remove_var("STRIPE_WEBHOOK_SECRET");

        let config = Config::from_env().expect("Failed to load config");

        assert_eq!(config.api_host, "0.0.0.0");
        assert_eq!(config.api_port, 8084);
        assert_eq!(config.app_origin, "http://localhost:3000");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert!(config.stripe_webhook_secret.is_none());
    }

    #[test]
    fn test_api_address() {
        let config = Config {
            api_host: "127.0.0.1".to_string(),
            api_port: 9000,
            ..Config::default()
        };

        assert_eq!(config.api_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            api_port: 0,
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API_PORT must be greater than 0"));
    }

    #[test]
    fn test_validate_origin() {
        let config = Config {
            app_origin: "pressready.app".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_billing_configured() {
        let mut config = Config::default();
        assert!(!config.billing_configured());

        config.stripe_secret_key = "sk_test".to_string();
        config.stripe_pro_price_id = "price_pro".to_string();
        assert!(config.billing_configured());
    }
}

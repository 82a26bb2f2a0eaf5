//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_STOCK_API_URL` - Base URL of the stock service (serves `/stock/{id}` and `/products/{id}`)
//!
//! ## Optional
//! - `CART_STOCK_API_TOKEN` - Bearer token for the stock service
//! - `CART_STORAGE_DIR` - Directory for the persisted cart (default: .cart)
//! - `CART_STORAGE_KEY` - Storage key for the cart blob (default: cart-store-v1)
//! - `CART_HTTP_TIMEOUT_SECS` - Stock service request timeout (default: 10)
//! - `CART_PRODUCT_CACHE_TTL_SECS` - Product metadata cache TTL (default: 300)
//! - `CART_CURRENCY` - ISO 4217 display currency (default: USD)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use storefront_cart_core::CurrencyCode;
use thiserror::Error;
use url::Url;

use crate::storage;

/// Default storage key for the persisted cart.
pub const DEFAULT_STORAGE_KEY: &str = "cart-store-v1";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Stock service connection settings
    pub stock: StockApiConfig,
    /// Directory holding the persisted cart
    pub storage_dir: PathBuf,
    /// Key the cart blob is stored under
    pub storage_key: String,
    /// Currency used when formatting prices
    pub currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Stock service configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct StockApiConfig {
    /// Base URL, e.g. `http://localhost:3333`
    pub base_url: Url,
    /// Optional bearer token
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long product metadata stays cached
    pub product_cache_ttl: Duration,
}

impl std::fmt::Debug for StockApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .field("product_cache_ttl", &self.product_cache_ttl)
            .finish()
    }
}

impl StockApiConfig {
    /// Settings for a stock service at `base_url` with default timeouts.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(10),
            product_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let base_url = parse_base_url(&env.required("CART_STOCK_API_URL")?)?;
        let api_token = env
            .optional("CART_STOCK_API_TOKEN")
            .map(|token| validated_secret(token, "CART_STOCK_API_TOKEN"))
            .transpose()?;
        let timeout = Duration::from_secs(env.parse_or("CART_HTTP_TIMEOUT_SECS", 10)?);
        let product_cache_ttl =
            Duration::from_secs(env.parse_or("CART_PRODUCT_CACHE_TTL_SECS", 300)?);

        let storage_dir = PathBuf::from(env.or_default("CART_STORAGE_DIR", ".cart"));
        let storage_key = env.or_default("CART_STORAGE_KEY", DEFAULT_STORAGE_KEY);
        storage::validate_key(&storage_key).map_err(|e| {
            ConfigError::InvalidEnvVar("CART_STORAGE_KEY".to_string(), e.to_string())
        })?;

        let currency = env
            .or_default("CART_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_CURRENCY".to_string(), e))?;

        Ok(Self {
            stock: StockApiConfig {
                base_url,
                api_token,
                timeout,
                product_cache_ttl,
            },
            storage_dir,
            storage_key,
            currency,
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to a default when unset.
    fn parse_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Parse the stock service base URL, requiring an http(s) scheme.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ConfigError::InvalidEnvVar("CART_STOCK_API_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "CART_STOCK_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Reject obvious placeholder tokens copied from sample `.env` files.
fn validated_secret(value: String, var_name: &str) -> Result<SecretString, ConfigError> {
    let secret = SecretString::from(value);
    let lower = secret.expose_secret().to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(secret)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CartConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CartConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("CART_STOCK_API_URL", "http://localhost:3333")]).unwrap();
        assert_eq!(config.stock.base_url.as_str(), "http://localhost:3333/");
        assert!(config.stock.api_token.is_none());
        assert_eq!(config.stock.timeout, Duration::from_secs(10));
        assert_eq!(config.stock.product_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.storage_dir, PathBuf::from(".cart"));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.currency, CurrencyCode::USD);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_stock_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "CART_STOCK_API_URL"));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = load(&[("CART_STOCK_API_URL", "ftp://stock.example.test")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = load(&[
            ("CART_STOCK_API_URL", "http://localhost:3333"),
            ("CART_HTTP_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "CART_HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_invalid_storage_key() {
        let err = load(&[
            ("CART_STOCK_API_URL", "http://localhost:3333"),
            ("CART_STORAGE_KEY", "../escape"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "CART_STORAGE_KEY"));
    }

    #[test]
    fn test_currency_override() {
        let config = load(&[
            ("CART_STOCK_API_URL", "http://localhost:3333"),
            ("CART_CURRENCY", "brl"),
        ])
        .unwrap();
        assert_eq!(config.currency, CurrencyCode::BRL);
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let err = load(&[
            ("CART_STOCK_API_URL", "http://localhost:3333"),
            ("CART_STOCK_API_TOKEN", "your-token-here"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_stock_config_debug_redacts_token() {
        let config = load(&[
            ("CART_STOCK_API_URL", "http://localhost:3333"),
            ("CART_STOCK_API_TOKEN", "tk_9f2Lq8ZmW3vR7yBn"),
        ])
        .unwrap();

        let debug_output = format!("{:?}", config.stock);
        assert!(debug_output.contains("localhost:3333"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tk_9f2Lq8ZmW3vR7yBn"));
    }
}

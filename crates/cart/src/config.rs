//! Cart client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FYP_API_BASE_URL` - Base URL of the marketplace API (e.g., <https://api.findyourplug.ng/v1>)
//!
//! ## Optional
//! - `FYP_API_TOKEN` - Bearer token of the signed-in shopper; absent means anonymous
//! - `FYP_GUEST_CART_DIR` - Directory for the guest cart file (default: .findyourplug)
//! - `FYP_GUEST_CART_TTL_DAYS` - Guest cart inactivity expiry in days (default: 7)
//! - `FYP_CART_CACHE_TTL_SECS` - Authenticated cart cache TTL in seconds (default: 60)
//! - `FYP_HTTP_TIMEOUT_SECS` - Per-request timeout (default: none)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use plug_core::GUEST_CART_TTL_DAYS;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
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

/// Cart subsystem configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Backend cart API configuration
    pub api: CartApiConfig,
    /// Guest cart persistence configuration
    pub guest: GuestCartConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name (e.g., production, staging)
    pub sentry_environment: Option<String>,
}

/// Backend cart API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct CartApiConfig {
    /// Base URL all cart endpoints are resolved against
    pub base_url: Url,
    /// Bearer token of the signed-in shopper
    pub token: Option<SecretString>,
    /// Time-to-live of cached cart reads
    pub cache_ttl: Duration,
    /// Per-request timeout; `None` keeps the HTTP client default
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for CartApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("cache_ttl", &self.cache_ttl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Guest cart persistence configuration.
#[derive(Debug, Clone)]
pub struct GuestCartConfig {
    /// Directory holding the guest cart file
    pub dir: PathBuf,
    /// Inactivity window after which a guest cart expires
    pub ttl: chrono::Duration,
}

impl Default for GuestCartConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".findyourplug"),
            ttl: chrono::Duration::days(GUEST_CART_TTL_DAYS),
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
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: CartApiConfig::from_env()?,
            guest: GuestCartConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Whether a shopper token is configured.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.api.token.is_some()
    }
}

impl CartApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url("FYP_API_BASE_URL", &get_required_env("FYP_API_BASE_URL")?)?;

        let token = get_optional_env("FYP_API_TOKEN")
            .map(|value| {
                validate_secret_strength(&value, "FYP_API_TOKEN")?;
                Ok(SecretString::from(value))
            })
            .transpose()?;

        let cache_ttl = Duration::from_secs(get_parsed_env_or_default(
            "FYP_CART_CACHE_TTL_SECS",
            60u64,
        )?);
        let timeout = get_optional_env("FYP_HTTP_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ConfigError::InvalidEnvVar("FYP_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            base_url,
            token,
            cache_ttl,
            timeout,
        })
    }
}

impl GuestCartConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_days = get_parsed_env_or_default("FYP_GUEST_CART_TTL_DAYS", GUEST_CART_TTL_DAYS)?;
        if ttl_days <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "FYP_GUEST_CART_TTL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            dir: PathBuf::from(get_env_or_default("FYP_GUEST_CART_DIR", ".findyourplug")),
            ttl: chrono::Duration::days(ttl_days),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse and check the API base URL.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "URL must have a host".to_string(),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Check that a token value would be accepted, without exposing it.
///
/// # Errors
///
/// Returns `ConfigError::InsecureSecret` for placeholder or low-entropy tokens.
pub fn validate_token(token: &SecretString) -> Result<(), ConfigError> {
    validate_secret_strength(token.expose_secret(), "FYP_API_TOKEN")
}

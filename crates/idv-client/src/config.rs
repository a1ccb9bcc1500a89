//! Verification client configuration.
//!
//! Resolved from environment variables. Credentials are provisioned
//! externally and consumed here as plain configuration.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::variant::ProtocolVariant;

/// Default API-key header name.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-KEY";

/// Default poll attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default delay between poll attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Configuration for connecting to the verification backend.
///
/// Custom `Debug` implementation redacts the credentials.
#[derive(Clone)]
pub struct IdvConfig {
    /// Base URL of the verification sessions resource.
    pub base_url: Url,
    /// Bearer token for API authentication.
    pub api_token: Zeroizing<String>,
    /// Optional API key sent in `api_key_header`.
    pub api_key: Option<Zeroizing<String>>,
    /// Header carrying the API key.
    pub api_key_header: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Backend variant.
    pub variant: ProtocolVariant,
    /// Poll attempt ceiling.
    pub max_attempts: u32,
    /// Delay between poll attempts.
    pub retry_delay: Duration,
}

impl std::fmt::Debug for IdvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdvConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_header", &self.api_key_header)
            .field("timeout_secs", &self.timeout_secs)
            .field("variant", &self.variant.name())
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl IdvConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `IDV_BASE_URL` (required)
    /// - `IDV_API_TOKEN` (required)
    /// - `IDV_API_KEY` (optional)
    /// - `IDV_API_KEY_HEADER` (default: `X-API-KEY`)
    /// - `IDV_VARIANT` (`two-phase` | `polling`, default: `polling`)
    /// - `IDV_MAX_ATTEMPTS` (default: 30)
    /// - `IDV_RETRY_DELAY_MS` (default: 2000)
    /// - `IDV_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("IDV_BASE_URL").ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = parse_url("IDV_BASE_URL", &raw_url)?;
        let api_token = lookup("IDV_API_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let variant = match lookup("IDV_VARIANT") {
            Some(raw) => raw
                .parse()
                .map_err(|e: crate::variant::UnknownVariant| ConfigError::InvalidValue {
                    var: "IDV_VARIANT".into(),
                    reason: e.to_string(),
                })?,
            None => ProtocolVariant::default(),
        };

        let max_attempts = parse_or("IDV_MAX_ATTEMPTS", &lookup, DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                var: "IDV_MAX_ATTEMPTS".into(),
                reason: "must be at least 1".into(),
            });
        }
        let delay_ms = parse_or(
            "IDV_RETRY_DELAY_MS",
            &lookup,
            DEFAULT_RETRY_DELAY.as_millis() as u64,
        )?;

        Ok(Self {
            base_url,
            api_token: Zeroizing::new(api_token),
            api_key: lookup("IDV_API_KEY")
                .filter(|key| !key.is_empty())
                .map(Zeroizing::new),
            api_key_header: lookup("IDV_API_KEY_HEADER")
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
            timeout_secs: parse_or("IDV_TIMEOUT_SECS", &lookup, 30)?,
            variant,
            max_attempts,
            retry_delay: Duration::from_millis(delay_ms),
        })
    }

    /// Create a configuration pointing to a local mock server (for testing).
    ///
    /// Polling is fast (10ms) so tests don't wait on the production delay.
    pub fn local_mock(uri: &str, variant: ProtocolVariant) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_url("local_mock", uri)?,
            api_token: Zeroizing::new("test-token".into()),
            api_key: Some(Zeroizing::new("test-key".into())),
            api_key_header: DEFAULT_API_KEY_HEADER.into(),
            timeout_secs: 5,
            variant,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(10),
        })
    }

    /// Builder: override the poll ceiling and delay.
    pub fn with_polling(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn parse_or<T>(
    var: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: var.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `IDV_BASE_URL` is not set.
    #[error("IDV_BASE_URL environment variable is required")]
    MissingBaseUrl,
    /// `IDV_API_TOKEN` is not set or empty.
    #[error("IDV_API_TOKEN environment variable is required")]
    MissingToken,
    /// A URL could not be parsed.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    /// A numeric or enumerated value could not be parsed.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// Variable name.
        var: String,
        /// Parser message.
        reason: String,
    },
}

//! Socket settings
//!
//! Loads connection settings from environment variables or a config file and
//! validates them into the form the client consumes.

use resock_core::{Backoff, RetryPolicy};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Raw connection settings, as written by the user
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SocketSettings {
    /// Server URL (`ws://` or `wss://`)
    pub url: String,
    /// Sub-protocols offered during the handshake
    #[serde(default)]
    pub protocols: Vec<String>,
    /// Delay before a reconnection attempt, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: i64,
    /// Maximum number of reconnection attempts after a closure
    #[serde(default)]
    pub retry_attempt_limit: Option<u32>,
    /// Exponential backoff multiplier
    #[serde(default)]
    pub backoff_rate: Option<f64>,
    /// Upper bound for a backed-off delay, in milliseconds
    #[serde(default)]
    pub backoff_limit_ms: Option<u64>,
    /// Reconnect after a spontaneous closure
    #[serde(default = "default_reconnect_automatically")]
    pub reconnect_automatically: bool,
}

/// Settings that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings {
    pub url: Url,
    pub protocols: Vec<String>,
    pub retry: RetryPolicy,
    pub reconnect_automatically: bool,
}

// Default value functions
fn default_retry_delay_ms() -> i64 {
    1000
}

fn default_reconnect_automatically() -> bool {
    true
}

impl SocketSettings {
    /// Settings for `url` with every other field at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_attempt_limit: None,
            backoff_rate: None,
            backoff_limit_ms: None,
            reconnect_automatically: default_reconnect_automatically(),
        }
    }

    /// Set the offered sub-protocols
    #[must_use]
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Set the reconnection delay
    #[must_use]
    pub fn retry_delay_ms(mut self, delay_ms: i64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Stop reconnecting after `limit` attempts
    #[must_use]
    pub fn retry_attempt_limit(mut self, limit: u32) -> Self {
        self.retry_attempt_limit = Some(limit);
        self
    }

    /// Enable exponential backoff
    #[must_use]
    pub fn backoff(mut self, rate: f64, limit_ms: Option<u64>) -> Self {
        self.backoff_rate = Some(rate);
        self.backoff_limit_ms = limit_ms;
        self
    }

    /// Enable or disable automatic reconnection
    #[must_use]
    pub fn reconnect_automatically(mut self, enabled: bool) -> Self {
        self.reconnect_automatically = enabled;
        self
    }

    /// Load settings from environment variables
    ///
    /// Reads a `.env` file first if one is present.
    ///
    /// # Errors
    /// Returns an error if `RESOCK_URL` is missing or a value cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvVars::read(&lookup)?;
        let url = vars.url.ok_or(ConfigError::MissingVar("RESOCK_URL"))?;

        Ok(Self {
            url,
            protocols: vars.protocols.unwrap_or_default(),
            retry_delay_ms: vars.retry_delay_ms.unwrap_or_else(default_retry_delay_ms),
            retry_attempt_limit: vars.retry_attempt_limit,
            backoff_rate: vars.backoff_rate,
            backoff_limit_ms: vars.backoff_limit_ms,
            reconnect_automatically: vars
                .reconnect_automatically
                .unwrap_or_else(default_reconnect_automatically),
        })
    }

    /// Load settings from a config file, overridden by `RESOCK_*` variables
    ///
    /// The format is picked from the file extension (TOML, JSON, YAML, ...).
    /// Variables are read exactly as [`from_env`](Self::from_env) reads them,
    /// including a `.env` file if one is present.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Self::from_file_with_lookup(path.as_ref(), |name| env::var(name).ok())
    }

    fn from_file_with_lookup<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvVars::read(&lookup)?;

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .set_override_option("url", vars.url)?
            .set_override_option("protocols", vars.protocols)?
            .set_override_option("retry_delay_ms", vars.retry_delay_ms)?
            .set_override_option("retry_attempt_limit", vars.retry_attempt_limit)?
            .set_override_option("backoff_rate", vars.backoff_rate)?
            .set_override_option("backoff_limit_ms", vars.backoff_limit_ms)?
            .set_override_option("reconnect_automatically", vars.reconnect_automatically)?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Validate the settings
    ///
    /// # Errors
    /// Returns the first problem found: bad URL, negative delay, bad backoff
    /// rate, or malformed protocol list.
    pub fn validate(&self) -> Result<ValidatedSettings, ConfigError> {
        let url = validate_url(&self.url)?;
        validate_protocols(&self.protocols)?;

        let delay_ms = u64::try_from(self.retry_delay_ms)
            .map_err(|_| ConfigError::NegativeDelay(self.retry_delay_ms))?;
        let mut retry = RetryPolicy::fixed(Duration::from_millis(delay_ms));

        if let Some(limit) = self.retry_attempt_limit {
            retry = retry.with_attempt_limit(limit);
        }

        match (self.backoff_rate, self.backoff_limit_ms) {
            (Some(rate), limit_ms) => {
                if !rate.is_finite() || rate < 1.0 {
                    return Err(ConfigError::InvalidBackoffRate(rate));
                }
                let mut backoff = Backoff::new(rate);
                if let Some(limit_ms) = limit_ms {
                    backoff = backoff.with_limit(Duration::from_millis(limit_ms));
                }
                retry = retry.with_backoff(backoff);
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidValue(
                    "backoff_limit_ms",
                    "requires backoff_rate".to_string(),
                ));
            }
            (None, None) => {}
        }

        Ok(ValidatedSettings {
            url,
            protocols: self.protocols.clone(),
            retry,
            reconnect_automatically: self.reconnect_automatically,
        })
    }
}

/// `RESOCK_*` variables that were set
#[derive(Debug, Default)]
struct EnvVars {
    url: Option<String>,
    protocols: Option<Vec<String>>,
    retry_delay_ms: Option<i64>,
    retry_attempt_limit: Option<u32>,
    backoff_rate: Option<f64>,
    backoff_limit_ms: Option<u64>,
    reconnect_automatically: Option<bool>,
}

impl EnvVars {
    fn read<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            url: lookup("RESOCK_URL"),
            protocols: lookup("RESOCK_PROTOCOLS").map(|raw| split_protocols(&raw)),
            retry_delay_ms: parse_var(lookup, "RESOCK_RETRY_DELAY_MS")?,
            retry_attempt_limit: parse_var(lookup, "RESOCK_RETRY_ATTEMPT_LIMIT")?,
            backoff_rate: parse_var(lookup, "RESOCK_BACKOFF_RATE")?,
            backoff_limit_ms: parse_var(lookup, "RESOCK_BACKOFF_LIMIT_MS")?,
            reconnect_automatically: parse_var(lookup, "RESOCK_RECONNECT")?,
        })
    }
}

/// Split a comma-separated protocol list, dropping blanks
fn split_protocols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(None),
    }
}

fn validate_url(raw: &str) -> Result<Url, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::EmptyUrl);
    }

    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidValue("url", "missing host".to_string()));
    }

    Ok(url)
}

fn validate_protocols(protocols: &[String]) -> Result<(), ConfigError> {
    for (index, protocol) in protocols.iter().enumerate() {
        let malformed = protocol.is_empty()
            || protocol
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == ',' || !c.is_ascii());
        if malformed {
            return Err(ConfigError::InvalidProtocol(protocol.clone()));
        }
        if protocols[..index].contains(protocol) {
            return Err(ConfigError::DuplicateProtocol(protocol.clone()));
        }
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("URL must not be empty")]
    EmptyUrl,

    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] url::ParseError),

    #[error("Unsupported URL scheme '{0}' (expected ws or wss)")]
    UnsupportedScheme(String),

    #[error("Retry delay must not be negative: {0}ms")]
    NegativeDelay(i64),

    #[error("Backoff rate must be a finite number >= 1: {0}")]
    InvalidBackoffRate(f64),

    #[error("Invalid protocol name: '{0}'")]
    InvalidProtocol(String),

    #[error("Protocol listed twice: '{0}'")]
    DuplicateProtocol(String),

    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("No Tokio runtime is running; build the socket inside one")]
    NoRuntime,
}

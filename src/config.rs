//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::reconnect::{Backoff, ReconnectSettings};

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8765";
pub const DEFAULT_UPLOAD_URL: &str = "http://127.0.0.1:5001/upload-media";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
pub const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid websocket URL '{0}' (expected ws:// or wss://)")]
    InvalidWsUrl(String),
    #[error("invalid upload URL '{0}' (expected http:// or https://)")]
    InvalidUploadUrl(String),
    #[error("unknown CHATLINK_RECONNECT_BACKOFF '{0}' (expected 'fixed' or 'exponential')")]
    UnknownBackoff(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub ws_url: String,
    pub upload_url: String,
    pub reconnect: ReconnectSettings,
    pub connect_timeout: Duration,
    pub upload_timeout: Duration,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `CHATLINK_WS_URL`: default `ws://localhost:8765`
    /// - `CHATLINK_UPLOAD_URL`: default `http://127.0.0.1:5001/upload-media`
    /// - `CHATLINK_RECONNECT_DELAY_MS`: default 3000
    /// - `CHATLINK_RECONNECT_BACKOFF`: `fixed` (default) or `exponential`
    /// - `CHATLINK_RECONNECT_MAX_DELAY_MS`: default 10000, exponential only
    /// - `CHATLINK_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CHATLINK_UPLOAD_TIMEOUT_SECS`: default 60
    ///
    /// Numeric values that are zero or unparseable fall back to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ws_url = lookup("CHATLINK_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_owned());
        let upload_url = lookup("CHATLINK_UPLOAD_URL").unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_owned());

        let delay = Duration::from_millis(parse_u64(&lookup, "CHATLINK_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS));
        let max_delay =
            Duration::from_millis(parse_u64(&lookup, "CHATLINK_RECONNECT_MAX_DELAY_MS", DEFAULT_RECONNECT_MAX_DELAY_MS));
        let backoff = parse_backoff(lookup("CHATLINK_RECONNECT_BACKOFF").as_deref(), max_delay)?;

        let config = Self {
            ws_url,
            upload_url,
            reconnect: ReconnectSettings { delay, backoff },
            connect_timeout: Duration::from_secs(parse_u64(
                &lookup,
                "CHATLINK_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            upload_timeout: Duration::from_secs(parse_u64(
                &lookup,
                "CHATLINK_UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT_SECS,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check URL schemes. Called by the loaders and by the CLI after flag overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidWsUrl(self.ws_url.clone()));
        }
        if !(self.upload_url.starts_with("http://") || self.upload_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUploadUrl(self.upload_url.clone()));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_owned(),
            upload_url: DEFAULT_UPLOAD_URL.to_owned(),
            reconnect: ReconnectSettings::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
        }
    }
}

/// Zero falls back to `default` like an unparseable value; a zero delay or
/// timeout would spin the reconnect loop.
fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_backoff(raw: Option<&str>, max_delay: Duration) -> Result<Backoff, ConfigError> {
    match raw.unwrap_or("fixed") {
        "fixed" => Ok(Backoff::Fixed),
        "exponential" => Ok(Backoff::Exponential { max: max_delay }),
        other => Err(ConfigError::UnknownBackoff(other.to_owned())),
    }
}

//! Session configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";
pub const DEFAULT_STORAGE_NAMESPACE: &str = "chatdesk";
pub const DEFAULT_STORAGE_PATH: &str = "chatdesk-session.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_url: String,
    pub namespace: String,
    pub storage_path: PathBuf,
    pub timeouts: HttpTimeouts,
    pub bootstrap_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            namespace: DEFAULT_STORAGE_NAMESPACE.to_owned(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            timeouts: HttpTimeouts::default(),
            bootstrap_timeout_secs: DEFAULT_BOOTSTRAP_TIMEOUT_SECS,
        }
    }
}

impl SessionConfig {
    /// Build typed session config from environment variables.
    ///
    /// Optional:
    /// - `CHATDESK_API_URL`: backend base URL, default `http://127.0.0.1:3000/api`
    /// - `CHATDESK_STORAGE_NAMESPACE`: key prefix, default `chatdesk`
    /// - `CHATDESK_STORAGE_PATH`: session file for `FileStore`
    /// - `CHATDESK_REQUEST_TIMEOUT_SECS`: default 30
    /// - `CHATDESK_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CHATDESK_BOOTSTRAP_TIMEOUT_SECS`: default 8
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is not an http(s) URL or the namespace is blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = parse_api_url(std::env::var("CHATDESK_API_URL").ok().as_deref())?;
        let namespace = parse_namespace(std::env::var("CHATDESK_STORAGE_NAMESPACE").ok().as_deref())?;
        let storage_path = std::env::var("CHATDESK_STORAGE_PATH")
            .map_or_else(|_| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);
        let timeouts = HttpTimeouts {
            request_secs: env_parse("CHATDESK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("CHATDESK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let bootstrap_timeout_secs = env_parse("CHATDESK_BOOTSTRAP_TIMEOUT_SECS", DEFAULT_BOOTSTRAP_TIMEOUT_SECS);

        Ok(Self { api_url, namespace, storage_path, timeouts, bootstrap_timeout_secs })
    }

    #[must_use]
    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_api_url(raw: Option<&str>) -> Result<String, ConfigError> {
    let url = raw.unwrap_or(DEFAULT_API_URL).trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            var: "CHATDESK_API_URL",
            reason: format!("expected an http(s) URL, got '{url}'"),
        });
    }
    Ok(url.to_owned())
}

fn parse_namespace(raw: Option<&str>) -> Result<String, ConfigError> {
    let namespace = raw.unwrap_or(DEFAULT_STORAGE_NAMESPACE).trim();
    if namespace.is_empty() {
        return Err(ConfigError::Invalid { var: "CHATDESK_STORAGE_NAMESPACE", reason: "must not be blank".into() });
    }
    Ok(namespace.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

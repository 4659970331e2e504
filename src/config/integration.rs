//! LAPS server integration settings.
//!
//! There is exactly one `Configuration` per database. It is loaded at the
//! start of every service call, so an update is visible to the next call
//! without any process-wide state.

use std::time::Duration;

use zeroize::Zeroizing;

use crate::errors::{LapsError, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_PASSWORD_ENDPOINT: &str = "api.php";

pub const TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 5..=300;
pub const CACHE_TTL_RANGE: std::ops::RangeInclusive<u64> = 60..=3600;

/// The integration row, with the API key already decrypted.
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Base URL of the LAPS server, e.g. `https://laps.example.com/api`.
    pub server_url: String,
    pub api_key: Option<Zeroizing<String>>,
    /// Path appended to `server_url` for password requests.
    pub password_endpoint: String,
    pub connection_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub is_active: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            api_key: None,
            password_endpoint: DEFAULT_PASSWORD_ENDPOINT.to_string(),
            connection_timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            is_active: true,
        }
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("server_url", &self.server_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("password_endpoint", &self.password_endpoint)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("is_active", &self.is_active)
            .finish()
    }
}

impl Configuration {
    /// Check bounds and formats. An empty URL or missing key is allowed
    /// here (the integration may simply not be set up yet); that is
    /// reported by [`Configuration::remote_target`] at use time.
    pub fn validate(&self) -> Result<()> {
        let url = self.server_url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LapsError::InvalidConfig(format!(
                "server URL must start with http:// or https:// (got '{url}')"
            )));
        }
        if !TIMEOUT_RANGE.contains(&self.connection_timeout_secs) {
            return Err(LapsError::InvalidConfig(format!(
                "connection timeout must be between {} and {} seconds",
                TIMEOUT_RANGE.start(),
                TIMEOUT_RANGE.end()
            )));
        }
        if !CACHE_TTL_RANGE.contains(&self.cache_ttl_secs) {
            return Err(LapsError::InvalidConfig(format!(
                "cache duration must be between {} and {} seconds",
                CACHE_TTL_RANGE.start(),
                CACHE_TTL_RANGE.end()
            )));
        }
        if self.password_endpoint.chars().any(char::is_whitespace) {
            return Err(LapsError::InvalidConfig(
                "password endpoint must not contain whitespace".into(),
            ));
        }
        Ok(())
    }

    /// Base URL and API key, or `NotConfigured` if either is missing.
    pub fn remote_target(&self) -> Result<(&str, &str)> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err(LapsError::NotConfigured("LAPS server URL is empty".into()));
        }
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok((url.trim_end_matches('/'), key.as_str())),
            _ => Err(LapsError::NotConfigured("LAPS API key is not set".into())),
        }
    }

    /// Full URL for password requests.
    pub fn password_url(&self) -> Result<String> {
        let (base, _) = self.remote_target()?;
        let endpoint = self.password_endpoint.trim_start_matches('/');
        if endpoint.is_empty() {
            Ok(base.to_string())
        } else {
            Ok(format!("{base}/{endpoint}"))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.cache_ttl_secs).unwrap_or(i64::MAX))
    }
}

/// What to do with a stored secret during an update.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum SecretUpdate {
    #[default]
    Keep,
    Replace(Zeroizing<String>),
    Clear,
}

impl std::fmt::Debug for SecretUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keep => f.write_str("Keep"),
            Self::Replace(_) => f.write_str("Replace([REDACTED])"),
            Self::Clear => f.write_str("Clear"),
        }
    }
}

/// A partial change to the integration row. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub server_url: Option<String>,
    pub api_key: SecretUpdate,
    pub password_endpoint: Option<String>,
    pub connection_timeout_secs: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
    pub is_active: Option<bool>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.server_url.is_none()
            && self.api_key == SecretUpdate::Keep
            && self.password_endpoint.is_none()
            && self.connection_timeout_secs.is_none()
            && self.cache_ttl_secs.is_none()
            && self.is_active.is_none()
    }

    /// Apply onto `current`, returning the new value and the names of the
    /// fields whose value actually changed.
    pub fn apply(&self, current: &Configuration) -> (Configuration, Vec<&'static str>) {
        let mut next = current.clone();
        let mut changed = Vec::new();

        if let Some(url) = &self.server_url {
            let url = url.trim().to_string();
            if url != next.server_url {
                next.server_url = url;
                changed.push("server_url");
            }
        }
        match &self.api_key {
            SecretUpdate::Keep => {}
            SecretUpdate::Replace(key) => {
                if next.api_key.as_ref() != Some(key) {
                    next.api_key = Some(key.clone());
                    changed.push("api_key");
                }
            }
            SecretUpdate::Clear => {
                if next.api_key.take().is_some() {
                    changed.push("api_key");
                }
            }
        }
        if let Some(endpoint) = &self.password_endpoint {
            if *endpoint != next.password_endpoint {
                next.password_endpoint = endpoint.clone();
                changed.push("password_endpoint");
            }
        }
        if let Some(timeout) = self.connection_timeout_secs {
            if timeout != next.connection_timeout_secs {
                next.connection_timeout_secs = timeout;
                changed.push("connection_timeout_secs");
            }
        }
        if let Some(ttl) = self.cache_ttl_secs {
            if ttl != next.cache_ttl_secs {
                next.cache_ttl_secs = ttl;
                changed.push("cache_ttl_secs");
            }
        }
        if let Some(active) = self.is_active {
            if active != next.is_active {
                next.is_active = active;
                changed.push("is_active");
            }
        }

        (next, changed)
    }
}

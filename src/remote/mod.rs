//! Talking to the LAPS server.
//!
//! The cache service only sees [`PasswordSource`]; [`LapsClient`] is the
//! HTTP implementation. Tests swap in a scripted source.

pub mod client;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::config::Configuration;
use crate::errors::RemoteError;

pub use client::{parse_expiration, LapsClient, PROBE_PATHS};

/// A password as returned by the server.
pub struct RemotePassword {
    pub password: Zeroizing<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for RemotePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePassword")
            .field("password", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityReport {
    /// The probe URL that answered, with the API key masked.
    pub endpoint: String,
    /// Server version, if the server reported one.
    pub version: Option<String>,
    pub message: String,
}

pub trait PasswordSource: Send + Sync {
    /// Fetch the current password for `host`. One request, no retries.
    fn fetch_password(
        &self,
        host: &str,
        config: &Configuration,
    ) -> Result<RemotePassword, RemoteError>;

    /// Check that the server is reachable and accepts the API key.
    fn probe(&self, config: &Configuration) -> Result<ConnectivityReport, RemoteError>;
}

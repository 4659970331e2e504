//! Blocking HTTP client for the LAPS server API.

use std::io;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use ureq::Agent;
use zeroize::Zeroizing;

use crate::config::Configuration;
use crate::errors::RemoteError;

use super::{ConnectivityReport, PasswordSource, RemotePassword};

/// Endpoints tried, in order, by a connectivity probe. Each is appended
/// to the server URL.
pub const PROBE_PATHS: [&str; 5] = ["/test", "/status", "/health", "?action=test", "?action=status"];

const USER_AGENT: &str = concat!("lapscache/", env!("CARGO_PKG_VERSION"));

/// [`PasswordSource`] backed by the LAPS server's HTTP API.
#[derive(Debug, Clone, Default)]
pub struct LapsClient;

impl LapsClient {
    pub fn new() -> Self {
        Self
    }

    fn agent(config: &Configuration) -> Agent {
        Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build()
            .into()
    }
}

impl PasswordSource for LapsClient {
    fn fetch_password(
        &self,
        host: &str,
        config: &Configuration,
    ) -> Result<RemotePassword, RemoteError> {
        let (_, api_key) = config
            .remote_target()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        let url = config
            .password_url()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        tracing::debug!(%url, host, "requesting password from LAPS server");

        let mut resp = Self::agent(config)
            .post(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .header("X-API-Key", api_key)
            .send_form([
                ("action", "get_password"),
                ("computer", host),
                ("api_key", api_key),
            ])
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        if status == 401 {
            return Err(RemoteError::InvalidApiKey);
        }
        if status != 200 {
            return Err(RemoteError::HttpStatus(status));
        }

        let body = resp.body_mut().read_to_string().map_err(transport_error)?;
        let data: Value = serde_json::from_str(&body)
            .map_err(|_| RemoteError::InvalidResponse("response is not valid JSON".into()))?;
        let Some(fields) = data.as_object() else {
            return Err(RemoteError::InvalidResponse(
                "expected a JSON object".into(),
            ));
        };

        if let Some(message) = error_field(&data) {
            return Err(RemoteError::RemoteRejected(message));
        }

        match fields.get("password").and_then(Value::as_str) {
            Some(password) => Ok(RemotePassword {
                password: Zeroizing::new(password.to_string()),
                expires_at: fields
                    .get("expiration_timestamp")
                    .and_then(parse_expiration),
            }),
            None => Err(RemoteError::InvalidResponse(
                "no password in response".into(),
            )),
        }
    }

    fn probe(&self, config: &Configuration) -> Result<ConnectivityReport, RemoteError> {
        let (base, api_key) = config
            .remote_target()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        let agent = Self::agent(config);
        let mut last_error = None;

        for suffix in PROBE_PATHS {
            let url = probe_url(base, suffix);
            tracing::debug!(%url, "probing LAPS server");

            let result = agent
                .get(&url)
                .query("api_key", api_key)
                .header("Accept", "application/json")
                .header("User-Agent", USER_AGENT)
                .header("X-API-Key", api_key)
                .call();

            let mut resp = match result {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(transport_error(e));
                    continue;
                }
            };

            match resp.status().as_u16() {
                401 => return Err(RemoteError::InvalidApiKey),
                200 => {}
                code => {
                    last_error = Some(RemoteError::HttpStatus(code));
                    continue;
                }
            }

            let body = match resp.body_mut().read_to_string() {
                Ok(body) => body,
                Err(e) => {
                    last_error = Some(transport_error(e));
                    continue;
                }
            };
            let Ok(data) = serde_json::from_str::<Value>(&body) else {
                last_error = Some(RemoteError::InvalidResponse(format!(
                    "{url} did not return JSON"
                )));
                continue;
            };

            if let Some(message) = error_field(&data) {
                return Err(RemoteError::RemoteRejected(message));
            }

            let version = data.get("version").and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            let message = match &version {
                Some(v) => format!("connection successful (LAPS v{v})"),
                None => "connection successful".to_string(),
            };
            return Ok(ConnectivityReport {
                endpoint: url,
                version,
                message,
            });
        }

        Err(last_error
            .unwrap_or_else(|| RemoteError::Connection("no probe endpoint answered".into())))
    }
}

fn transport_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Timeout(_) => RemoteError::ConnectionTimeout,
        ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => RemoteError::ConnectionTimeout,
        other => RemoteError::Connection(other.to_string()),
    }
}

/// A non-null `error` field, rendered as text.
fn error_field(data: &Value) -> Option<String> {
    match data.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `https://laps` + `?action=test` needs a `/` before the query.
fn probe_url(base: &str, suffix: &str) -> String {
    let has_path = base
        .split_once("://")
        .is_some_and(|(_, rest)| rest.contains('/'));
    if suffix.starts_with('?') && !has_path {
        format!("{base}/{suffix}")
    } else {
        format!("{base}{suffix}")
    }
}

/// Parse the server's `expiration_timestamp`.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC) or Unix
/// seconds as a number or numeric string. Anything else is dropped.
pub fn parse_expiration(value: &Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
                .or_else(|| {
                    s.parse::<i64>()
                        .ok()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0))
                })
        }
        _ => None,
    };
    if parsed.is_none() {
        tracing::debug!(value = %value, "ignoring unparsable expiration_timestamp");
    }
    parsed
}

//! The password cache service: serve from cache while fresh, otherwise
//! fetch from the LAPS server, and leave an audit trail either way.
//!
//! Every operation reloads the integration configuration, so changes
//! made through [`PasswordCacheService::update_configuration`] (or by
//! another process sharing the database) apply to the next call.
//! Permission checks are the caller's job; see [`crate::access`].

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

use crate::access::Actor;
use crate::audit::{
    AuditEntry, AuditEvent, AuditFilter, AuditSink, AuditStats, NewAuditEntry, Outcome, Redactor,
    REDACTED,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigUpdate, Configuration};
use crate::crypto::encryption::decrypt_string;
use crate::crypto::{encrypt, MasterKey};
use crate::errors::{LapsError, Result};
use crate::remote::{ConnectivityReport, PasswordSource};
use crate::store::{
    CachedCredential, ConfigRepository, CredentialRepository, CredentialStatus, Database,
    StoredConfiguration,
};

/// `meta` key holding the master key check value.
pub const META_KEY_CHECK: &str = "key_check";
/// `meta` key holding the Argon2id salt of a passphrase-protected database.
pub const META_KDF_SALT: &str = "kdf_salt";

const API_KEY_CONTEXT: &[u8] = b"configuration:api_key";
const MAX_HOST_LEN: usize = 255;

/// A password handed to a caller.
pub struct CredentialView {
    pub host: String,
    pub password: Zeroizing<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub status: CredentialStatus,
    pub last_error: Option<String>,
    /// `true` when served without contacting the server.
    pub from_cache: bool,
}

impl std::fmt::Debug for CredentialView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialView")
            .field("host", &self.host)
            .field("password", &REDACTED)
            .field("expires_at", &self.expires_at)
            .field("fetched_at", &self.fetched_at)
            .field("status", &self.status)
            .field("last_error", &self.last_error)
            .field("from_cache", &self.from_cache)
            .finish()
    }
}

/// Cache row metadata, without the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub host: String,
    pub status: CredentialStatus,
    pub has_password: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Check a host identifier and return it trimmed.
pub fn validate_host(host: &str) -> Result<&str> {
    let host = host.trim();
    if host.is_empty() {
        return Err(LapsError::InvalidHost("host name is empty".into()));
    }
    if host.len() > MAX_HOST_LEN {
        return Err(LapsError::InvalidHost(format!(
            "host name is longer than {MAX_HOST_LEN} bytes"
        )));
    }
    if host.chars().any(char::is_control) {
        return Err(LapsError::InvalidHost(
            "host name contains control characters".into(),
        ));
    }
    Ok(host)
}

pub struct PasswordCacheService {
    credentials: Box<dyn CredentialRepository>,
    config: Box<dyn ConfigRepository>,
    audit: Box<dyn AuditSink>,
    remote: Box<dyn PasswordSource>,
    clock: Box<dyn Clock>,
    master_key: MasterKey,
}

impl PasswordCacheService {
    /// Build a service over `db` without checking the master key.
    pub fn new(db: &Database, remote: impl PasswordSource + 'static, master_key: MasterKey) -> Self {
        Self {
            credentials: Box::new(db.credentials()),
            config: Box::new(db.config_store()),
            audit: Box::new(db.audit_log()),
            remote: Box::new(remote),
            clock: Box::new(SystemClock),
            master_key,
        }
    }

    /// Record `master_key` as the key of a fresh database.
    pub fn initialize(
        db: &Database,
        remote: impl PasswordSource + 'static,
        master_key: MasterKey,
    ) -> Result<Self> {
        if db.meta_get(META_KEY_CHECK)?.is_some() {
            return Err(LapsError::AlreadyInitialized(db_path(db)));
        }
        db.meta_set(META_KEY_CHECK, &master_key.check_value()?)?;
        tracing::info!("master key enrolled");
        Ok(Self::new(db, remote, master_key))
    }

    /// Open an initialized database, rejecting a wrong master key.
    pub fn open(
        db: &Database,
        remote: impl PasswordSource + 'static,
        master_key: MasterKey,
    ) -> Result<Self> {
        let check = db
            .meta_get(META_KEY_CHECK)?
            .ok_or_else(|| LapsError::NotInitialized(db_path(db)))?;
        master_key.verify_check_value(&check)?;
        Ok(Self::new(db, remote, master_key))
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_audit_sink(mut self, audit: impl AuditSink + 'static) -> Self {
        self.audit = Box::new(audit);
        self
    }

    // ── Passwords ───────────────────────────────────────────────────

    /// Return the password for `host`, from cache if fresh and not
    /// `force_refresh`, otherwise from the LAPS server.
    pub fn get_password(
        &self,
        actor: &Actor,
        host: &str,
        force_refresh: bool,
    ) -> Result<CredentialView> {
        let host = validate_host(host)?;
        let config = self.configuration()?;
        if !config.is_active {
            return Err(LapsError::Inactive);
        }
        config.remote_target()?;

        let now = self.clock.now();
        let ttl = config.cache_ttl();

        if !force_refresh {
            if let Some(row) = self.credentials.get(host)? {
                if row.is_fresh(now, ttl) {
                    match self.view_from_row(&row, now, ttl) {
                        Ok(view) => {
                            tracing::debug!(host, "serving password from cache");
                            return Ok(view);
                        }
                        Err(e) => {
                            tracing::warn!(host, error = %e, "cached password unreadable, refetching");
                        }
                    }
                }
            }
        }

        let mut redactor = self.redactor(&config);
        let success_event = if force_refresh {
            AuditEvent::ManualRefresh
        } else {
            AuditEvent::PasswordSync
        };

        match self.remote.fetch_password(host, &config) {
            Ok(fetched) => {
                redactor.add_secret(&fetched.password);
                let sealed = self.seal_password(host, &fetched.password)?;
                self.credentials
                    .record_success(host, &sealed, fetched.expires_at, now)?;

                let detail = match fetched.expires_at {
                    Some(at) => format!("password fetched from LAPS server, expires {}", at.to_rfc3339()),
                    None => "password fetched from LAPS server".to_string(),
                };
                self.record(&redactor, actor, success_event, Some(host), Outcome::Success, Some(detail));
                tracing::info!(host, forced = force_refresh, "password refreshed");

                Ok(CredentialView {
                    host: host.to_string(),
                    password: fetched.password,
                    expires_at: fetched.expires_at,
                    fetched_at: Some(now),
                    status: CredentialStatus::Fresh,
                    last_error: None,
                    from_cache: false,
                })
            }
            Err(err) => {
                if let Some(previous) = self.cached_password(host) {
                    redactor.add_secret(&previous);
                }
                let message = redactor.redact(&err.to_string());
                self.credentials.record_failure(host, &message, now)?;

                self.record(
                    &redactor,
                    actor,
                    AuditEvent::RemoteFetchError,
                    Some(host),
                    Outcome::Failure,
                    Some(message.clone()),
                );
                if force_refresh {
                    self.record(
                        &redactor,
                        actor,
                        AuditEvent::ManualRefresh,
                        Some(host),
                        Outcome::Failure,
                        Some(message.clone()),
                    );
                }
                tracing::warn!(host, error = %message, "password fetch failed");

                Err(LapsError::RemoteFetchFailed(err))
            }
        }
    }

    /// Drop the cached row for `host`. Returns whether one existed.
    pub fn clear_cache(&self, actor: &Actor, host: &str) -> Result<bool> {
        let host = validate_host(host)?;
        let removed = self.credentials.delete(host)?;
        let detail = if removed {
            "cache entry removed"
        } else {
            "no cache entry to remove"
        };
        self.record(
            &Redactor::new(),
            actor,
            AuditEvent::CacheClear,
            Some(host),
            Outcome::Success,
            Some(detail.to_string()),
        );
        Ok(removed)
    }

    /// Metadata for every cached host, ordered by host.
    pub fn cached_entries(&self) -> Result<Vec<CacheEntryInfo>> {
        let config = self.configuration()?;
        let now = self.clock.now();
        let ttl = config.cache_ttl();
        Ok(self
            .credentials
            .list()?
            .into_iter()
            .map(|row| CacheEntryInfo {
                status: row.effective_status(now, ttl),
                has_password: row.secret.is_some(),
                host: row.host,
                fetched_at: row.fetched_at,
                expires_at: row.expires_at,
                last_error: row.last_error,
                updated_at: row.updated_at,
            })
            .collect())
    }

    /// Audit that `actor` displayed the password of `host`.
    pub fn record_view(&self, actor: &Actor, host: &str) -> Result<()> {
        let host = validate_host(host)?;
        self.record(&Redactor::new(), actor, AuditEvent::View, Some(host), Outcome::Success, None);
        Ok(())
    }

    /// Audit that `actor` copied the password of `host`.
    pub fn record_copy(&self, actor: &Actor, host: &str) -> Result<()> {
        let host = validate_host(host)?;
        self.record(&Redactor::new(), actor, AuditEvent::Copy, Some(host), Outcome::Success, None);
        Ok(())
    }

    // ── Configuration ───────────────────────────────────────────────

    /// The current integration settings with the API key decrypted.
    pub fn configuration(&self) -> Result<Configuration> {
        let stored = self.config.load()?;
        let api_key = match &stored.api_key {
            Some(sealed) => {
                let key = self.master_key.api_key_key()?;
                Some(decrypt_string(&key[..], API_KEY_CONTEXT, sealed)?)
            }
            None => None,
        };
        Ok(Configuration {
            server_url: stored.server_url,
            api_key,
            password_endpoint: stored.password_endpoint,
            connection_timeout_secs: stored.connection_timeout_secs,
            cache_ttl_secs: stored.cache_ttl_secs,
            is_active: stored.is_active,
        })
    }

    /// Apply `update`, persist it and audit the changed fields. Returns
    /// the names of the fields that changed (empty if nothing did).
    pub fn update_configuration(
        &self,
        actor: &Actor,
        update: &ConfigUpdate,
    ) -> Result<Vec<&'static str>> {
        let current = self.configuration()?;
        let (next, changed) = update.apply(&current);

        let mut redactor = self.redactor(&current);
        if let Some(key) = &next.api_key {
            redactor.add_secret(key);
        }

        if let Err(e) = next.validate() {
            self.record(
                &redactor,
                actor,
                AuditEvent::ConfigChange,
                None,
                Outcome::Failure,
                Some(e.to_string()),
            );
            return Err(e);
        }
        if changed.is_empty() {
            return Ok(changed);
        }

        self.save_configuration(&next)?;

        let detail = changed
            .iter()
            .map(|field| format!("{field}={}", field_value(&next, field)))
            .collect::<Vec<_>>()
            .join(", ");
        self.record(
            &redactor,
            actor,
            AuditEvent::ConfigChange,
            None,
            Outcome::Success,
            Some(format!("changed: {detail}")),
        );
        tracing::info!(fields = ?changed, "configuration updated");
        Ok(changed)
    }

    /// Probe the LAPS server described by `candidate` (typically the
    /// current configuration with unsaved edits applied). Never touches
    /// the cache or the stored configuration.
    pub fn test_remote_connectivity(
        &self,
        actor: &Actor,
        candidate: &Configuration,
    ) -> Result<ConnectivityReport> {
        let redactor = self.redactor(candidate);
        let result = candidate
            .validate()
            .and_then(|()| candidate.remote_target().map(|_| ()))
            .and_then(|()| self.remote.probe(candidate).map_err(LapsError::Remote));

        let (outcome, detail) = match &result {
            Ok(report) => (
                Outcome::Success,
                format!("{} via {}", report.message, report.endpoint),
            ),
            Err(e) => (Outcome::Failure, e.to_string()),
        };
        self.record(&redactor, actor, AuditEvent::ConnectionTest, None, outcome, Some(detail));
        result
    }

    // ── Audit ───────────────────────────────────────────────────────

    pub fn query_audit(
        &self,
        filter: &AuditFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>> {
        self.audit.query(filter, limit, offset)
    }

    pub fn audit_stats(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<AuditStats> {
        self.audit.stats(since, until)
    }

    /// Delete audit entries older than `retention_days`, then record the
    /// purge itself.
    pub fn purge_audit(&self, actor: &Actor, retention_days: u32) -> Result<usize> {
        if retention_days == 0 {
            return Err(LapsError::InvalidConfig(
                "retention must be at least one day".into(),
            ));
        }
        // A cutoff before the earliest representable instant matches nothing.
        let cutoff = Duration::try_days(i64::from(retention_days))
            .and_then(|age| self.clock.now().checked_sub_signed(age));
        let removed = match cutoff {
            Some(cutoff) => self.audit.purge_older_than(cutoff)?,
            None => 0,
        };
        self.record(
            &Redactor::new(),
            actor,
            AuditEvent::AuditPurge,
            None,
            Outcome::Success,
            Some(format!(
                "removed {removed} entries older than {retention_days} days"
            )),
        );
        Ok(removed)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn save_configuration(&self, config: &Configuration) -> Result<()> {
        let api_key = match &config.api_key {
            Some(plain) => {
                let key = self.master_key.api_key_key()?;
                Some(encrypt(&key[..], API_KEY_CONTEXT, plain.as_bytes())?)
            }
            None => None,
        };
        let stored = StoredConfiguration {
            server_url: config.server_url.clone(),
            api_key,
            password_endpoint: config.password_endpoint.clone(),
            connection_timeout_secs: config.connection_timeout_secs,
            cache_ttl_secs: config.cache_ttl_secs,
            is_active: config.is_active,
        };
        self.config.save(&stored, self.clock.now())
    }

    fn seal_password(&self, host: &str, password: &str) -> Result<Vec<u8>> {
        let key = self.master_key.host_key(host)?;
        encrypt(&key[..], host.as_bytes(), password.as_bytes())
    }

    fn view_from_row(
        &self,
        row: &CachedCredential,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<CredentialView> {
        let sealed = row.secret.as_deref().ok_or(LapsError::DecryptionFailed)?;
        let key = self.master_key.host_key(&row.host)?;
        let password = decrypt_string(&key[..], row.host.as_bytes(), sealed)?;
        Ok(CredentialView {
            host: row.host.clone(),
            password,
            expires_at: row.expires_at,
            fetched_at: row.fetched_at,
            status: row.effective_status(now, ttl),
            last_error: row.last_error.clone(),
            from_cache: true,
        })
    }

    /// The currently cached password of `host`, if there is a readable one.
    fn cached_password(&self, host: &str) -> Option<Zeroizing<String>> {
        let sealed = self.credentials.get(host).ok()??.secret?;
        let key = self.master_key.host_key(host).ok()?;
        decrypt_string(&key[..], host.as_bytes(), &sealed).ok()
    }

    fn redactor(&self, config: &Configuration) -> Redactor {
        let mut redactor = Redactor::new();
        if let Some(key) = &config.api_key {
            redactor.add_secret(key);
        }
        redactor
    }

    /// Append an audit entry. A failing sink is logged, never surfaced.
    fn record(
        &self,
        redactor: &Redactor,
        actor: &Actor,
        event: AuditEvent,
        host: Option<&str>,
        outcome: Outcome,
        detail: Option<String>,
    ) {
        let entry = NewAuditEntry {
            timestamp: self.clock.now(),
            event,
            actor: actor.identity.clone(),
            host: host.map(str::to_string),
            outcome,
            detail: detail.map(|d| redactor.redact(&d)),
        };
        if let Err(e) = self.audit.append(&entry) {
            tracing::warn!(event = %event, error = %e, "failed to write audit entry");
        }
    }
}

fn field_value(config: &Configuration, field: &str) -> String {
    match field {
        "server_url" => config.server_url.clone(),
        "api_key" => match config.api_key {
            Some(_) => REDACTED.to_string(),
            None => "(cleared)".to_string(),
        },
        "password_endpoint" => config.password_endpoint.clone(),
        "connection_timeout_secs" => config.connection_timeout_secs.to_string(),
        "cache_ttl_secs" => config.cache_ttl_secs.to_string(),
        "is_active" => config.is_active.to_string(),
        _ => String::new(),
    }
}

fn db_path(db: &Database) -> std::path::PathBuf {
    db.path().map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_trimmed() {
        assert_eq!(validate_host("  PC01 ").unwrap(), "PC01");
    }

    #[test]
    fn bad_hosts_are_rejected() {
        assert!(matches!(validate_host("   "), Err(LapsError::InvalidHost(_))));
        assert!(matches!(validate_host("PC\n01"), Err(LapsError::InvalidHost(_))));
        let long = "a".repeat(MAX_HOST_LEN + 1);
        assert!(matches!(validate_host(&long), Err(LapsError::InvalidHost(_))));
        assert!(validate_host(&"a".repeat(MAX_HOST_LEN)).is_ok());
    }

    #[test]
    fn field_values_never_show_the_key() {
        let config = Configuration {
            api_key: Some(Zeroizing::new("k-123".into())),
            ..Configuration::default()
        };
        assert_eq!(field_value(&config, "api_key"), REDACTED);
        assert_eq!(field_value(&config, "cache_ttl_secs"), "300");
    }
}

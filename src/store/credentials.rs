//! Credential cache table: one row per host, upserted on every fetch.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::errors::Result;

use super::{decode_opt_ts, decode_ts, encode_ts, Database};

/// Freshness of a cached credential.
///
/// Only `Fresh` and `Error` are ever written; `Stale` is what a `Fresh`
/// row becomes once its TTL has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Fresh,
    Stale,
    Error,
}

impl CredentialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fresh" => Some(Self::Fresh),
            "stale" => Some(Self::Stale),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cache row. `secret` is the sealed (encrypted) password, never plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedCredential {
    pub host: String,
    pub secret: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub status: CredentialStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for CachedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCredential")
            .field("host", &self.host)
            .field("secret", &self.secret.as_ref().map(|s| format!("<{} bytes>", s.len())))
            .field("expires_at", &self.expires_at)
            .field("fetched_at", &self.fetched_at)
            .field("status", &self.status)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl CachedCredential {
    /// A row can be served without a remote call iff it holds a secret
    /// fetched less than `ttl` ago. A later failed refresh does not
    /// shorten that window.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        match (&self.secret, self.fetched_at) {
            (Some(_), Some(fetched)) => now - fetched < ttl,
            _ => false,
        }
    }

    /// Status as seen at `now`: a stored `fresh` past its TTL reads `stale`.
    pub fn effective_status(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> CredentialStatus {
        match self.status {
            CredentialStatus::Error => CredentialStatus::Error,
            _ if self.is_fresh(now, ttl) => CredentialStatus::Fresh,
            _ => CredentialStatus::Stale,
        }
    }
}

/// Row-level access to the credential cache.
pub trait CredentialRepository: Send + Sync {
    fn get(&self, host: &str) -> Result<Option<CachedCredential>>;

    /// Upsert after a successful fetch: new secret, `status = fresh`,
    /// `last_error` cleared, `fetched_at = now`. The stored time always
    /// belongs to the stored secret, so a clock that stepped back cannot
    /// leave a future `fetched_at` behind.
    fn record_success(
        &self,
        host: &str,
        sealed_secret: &[u8],
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Upsert after a failed fetch: `status = error` and `last_error`
    /// set. Any previous secret and `fetched_at` stay as they were.
    fn record_failure(&self, host: &str, error: &str, now: DateTime<Utc>) -> Result<()>;

    /// Remove the row. Returns whether one existed.
    fn delete(&self, host: &str) -> Result<bool>;

    /// All rows, ordered by host.
    fn list(&self) -> Result<Vec<CachedCredential>>;
}

/// SQLite-backed credential cache.
#[derive(Clone)]
pub struct CredentialCache {
    db: Database,
}

const COLUMNS: &str =
    "host, secret, expires_at, fetched_at, status, last_error, created_at, updated_at";

impl CredentialCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<CachedCredential> {
        let status: String = row.get(4)?;
        let created: String = row.get(6)?;
        let updated: String = row.get(7)?;
        Ok(CachedCredential {
            host: row.get(0)?,
            secret: row.get(1)?,
            expires_at: decode_opt_ts(2, row.get(2)?)?,
            fetched_at: decode_opt_ts(3, row.get(3)?)?,
            status: CredentialStatus::parse(&status).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("unknown credential status '{status}'").into(),
                )
            })?,
            last_error: row.get(5)?,
            created_at: decode_ts(6, &created)?,
            updated_at: decode_ts(7, &updated)?,
        })
    }
}

impl CredentialRepository for CredentialCache {
    fn get(&self, host: &str) -> Result<Option<CachedCredential>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM credentials WHERE host = ?1"),
                [host],
                Self::from_row,
            )
            .optional()
        })
    }

    fn record_success(
        &self,
        host: &str,
        sealed_secret: &[u8],
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now = encode_ts(&now);
        let expires = expires_at.as_ref().map(encode_ts);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO credentials
                     (host, secret, expires_at, fetched_at, status, last_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'fresh', NULL, ?4, ?4)
                 ON CONFLICT(host) DO UPDATE SET
                     secret = excluded.secret,
                     expires_at = excluded.expires_at,
                     fetched_at = excluded.fetched_at,
                     status = 'fresh',
                     last_error = NULL,
                     updated_at = excluded.updated_at",
                params![host, sealed_secret, expires, now],
            )
            .map(|_| ())
        })
    }

    fn record_failure(&self, host: &str, error: &str, now: DateTime<Utc>) -> Result<()> {
        let now = encode_ts(&now);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO credentials
                     (host, secret, expires_at, fetched_at, status, last_error, created_at, updated_at)
                 VALUES (?1, NULL, NULL, NULL, 'error', ?2, ?3, ?3)
                 ON CONFLICT(host) DO UPDATE SET
                     status = 'error',
                     last_error = excluded.last_error,
                     updated_at = excluded.updated_at",
                params![host, error, now],
            )
            .map(|_| ())
        })
    }

    fn delete(&self, host: &str) -> Result<bool> {
        let removed = self
            .db
            .with_conn(|conn| conn.execute("DELETE FROM credentials WHERE host = ?1", [host]))?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<CachedCredential>> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM credentials ORDER BY host"))?;
            let rows = stmt.query_map([], Self::from_row)?;
            rows.collect()
        })
    }
}

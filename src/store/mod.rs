//! SQLite persistence.
//!
//! One database file per data directory holds the credential cache, the
//! integration configuration, the audit log and a small `meta` table
//! (master key check value, KDF salt). The connection is shared behind a
//! mutex and only locked for the duration of a single statement.

pub mod config;
pub mod credentials;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{LapsError, Result};

pub use config::{ConfigRepository, ConfigStore, StoredConfiguration};
pub use credentials::{CachedCredential, CredentialCache, CredentialRepository, CredentialStatus};

/// Name of the database file inside the data directory.
pub const DB_FILE_NAME: &str = "lapscache.db";

/// Shared handle to the SQLite database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Self::init(Connection::open(path)?, Some(path.to_path_buf()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(db)
    }

    /// A private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(schema::SCHEMA)?;
        tracing::debug!(path = ?path, "database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` with the connection locked.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| LapsError::Persistence("database lock poisoned".into()))?;
        Ok(f(&conn)?)
    }

    pub fn meta_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    pub fn meta_set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map(|_| ())
        })
    }

    pub fn credentials(&self) -> CredentialCache {
        CredentialCache::new(self.clone())
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.clone())
    }

    pub fn audit_log(&self) -> crate::audit::AuditLog {
        crate::audit::AuditLog::new(self.clone())
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that SQL
/// string comparison orders them correctly.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

pub(crate) fn decode_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| decode_ts(idx, &s)).transpose()
}

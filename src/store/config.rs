//! The single-row `configuration` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::config::integration::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_PASSWORD_ENDPOINT, DEFAULT_TIMEOUT_SECS,
};
use crate::errors::Result;

use super::{encode_ts, Database};

/// The configuration row as stored: the API key is still sealed.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredConfiguration {
    pub server_url: String,
    pub api_key: Option<Vec<u8>>,
    pub password_endpoint: String,
    pub connection_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub is_active: bool,
}

impl Default for StoredConfiguration {
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

impl std::fmt::Debug for StoredConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredConfiguration")
            .field("server_url", &self.server_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<sealed>"))
            .field("password_endpoint", &self.password_endpoint)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("is_active", &self.is_active)
            .finish()
    }
}

pub trait ConfigRepository: Send + Sync {
    /// The stored row, or defaults if none was ever saved.
    fn load(&self) -> Result<StoredConfiguration>;

    fn save(&self, config: &StoredConfiguration, now: DateTime<Utc>) -> Result<()>;
}

#[derive(Clone)]
pub struct ConfigStore {
    db: Database,
}

impl ConfigStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl ConfigRepository for ConfigStore {
    fn load(&self) -> Result<StoredConfiguration> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT server_url, api_key, password_endpoint, connection_timeout_secs,
                        cache_ttl_secs, is_active
                 FROM configuration WHERE id = 1",
                [],
                |row| {
                    Ok(StoredConfiguration {
                        server_url: row.get(0)?,
                        api_key: row.get(1)?,
                        password_endpoint: row.get(2)?,
                        connection_timeout_secs: row.get::<_, i64>(3)?.max(0) as u64,
                        cache_ttl_secs: row.get::<_, i64>(4)?.max(0) as u64,
                        is_active: row.get(5)?,
                    })
                },
            )
            .optional()
        })?;
        Ok(row.unwrap_or_default())
    }

    fn save(&self, config: &StoredConfiguration, now: DateTime<Utc>) -> Result<()> {
        let timeout = i64::try_from(config.connection_timeout_secs).unwrap_or(i64::MAX);
        let ttl = i64::try_from(config.cache_ttl_secs).unwrap_or(i64::MAX);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO configuration
                     (id, server_url, api_key, password_endpoint, connection_timeout_secs,
                      cache_ttl_secs, is_active, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     server_url = excluded.server_url,
                     api_key = excluded.api_key,
                     password_endpoint = excluded.password_endpoint,
                     connection_timeout_secs = excluded.connection_timeout_secs,
                     cache_ttl_secs = excluded.cache_ttl_secs,
                     is_active = excluded.is_active,
                     updated_at = excluded.updated_at",
                params![
                    config.server_url,
                    config.api_key,
                    config.password_endpoint,
                    timeout,
                    ttl,
                    config.is_active,
                    encode_ts(&now),
                ],
            )
            .map(|_| ())
        })
    }
}

//! SQLite schema. Every statement is idempotent so `Database::open` can
//! run the whole batch on each start.

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key    TEXT PRIMARY KEY,
    value  BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    host        TEXT PRIMARY KEY,
    secret      BLOB,
    expires_at  TEXT,
    fetched_at  TEXT,
    status      TEXT NOT NULL,
    last_error  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS configuration (
    id                       INTEGER PRIMARY KEY CHECK (id = 1),
    server_url               TEXT NOT NULL DEFAULT '',
    api_key                  BLOB,
    password_endpoint        TEXT NOT NULL,
    connection_timeout_secs  INTEGER NOT NULL,
    cache_ttl_secs           INTEGER NOT NULL,
    is_active                INTEGER NOT NULL,
    updated_at               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp  TEXT NOT NULL,
    event      TEXT NOT NULL,
    actor      TEXT NOT NULL,
    host       TEXT,
    success    INTEGER NOT NULL,
    detail     TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log (timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_event ON audit_log (event);
CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_log (actor);
CREATE INDEX IF NOT EXISTS idx_audit_host ON audit_log (host);
";

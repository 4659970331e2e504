//! Audit log — SQLite-based record of every security-relevant action.
//!
//! Entries are append-only: nothing updates a row, and the only delete
//! is the retention purge. Writers go through [`AuditSink`] so the cache
//! service can be exercised against a failing sink in tests.

pub mod redact;

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::errors::{LapsError, Result};
use crate::store::{decode_ts, encode_ts, Database};

pub use redact::{Redactor, REDACTED};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEvent {
    View,
    Copy,
    ManualRefresh,
    CacheClear,
    RemoteFetchError,
    ConfigChange,
    ConnectionTest,
    PasswordSync,
    AuditPurge,
}

impl AuditEvent {
    pub const ALL: [AuditEvent; 9] = [
        AuditEvent::View,
        AuditEvent::Copy,
        AuditEvent::ManualRefresh,
        AuditEvent::CacheClear,
        AuditEvent::RemoteFetchError,
        AuditEvent::ConfigChange,
        AuditEvent::ConnectionTest,
        AuditEvent::PasswordSync,
        AuditEvent::AuditPurge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Copy => "copy",
            Self::ManualRefresh => "manual-refresh",
            Self::CacheClear => "cache-clear",
            Self::RemoteFetchError => "remote-fetch-error",
            Self::ConfigChange => "config-change",
            Self::ConnectionTest => "connection-test",
            Self::PasswordSync => "password-sync",
            Self::AuditPurge => "audit-purge",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEvent {
    type Err = LapsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|e| e.as_str()).collect();
                LapsError::CommandFailed(format!(
                    "unknown audit event '{s}' — expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
        })
    }
}

/// An entry about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub actor: String,
    pub host: Option<String>,
    pub outcome: Outcome,
    pub detail: Option<String>,
}

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub actor: String,
    pub host: Option<String>,
    pub outcome: Outcome,
    pub detail: Option<String>,
}

/// Query filters. Every `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event: Option<AuditEvent>,
    pub actor: Option<String>,
    pub host: Option<String>,
    pub outcome: Option<Outcome>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Aggregate counts over a time range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStats {
    /// Count per event kind, most frequent first.
    pub by_event: Vec<(String, u64)>,
    /// Up to ten actors with the most entries.
    pub top_actors: Vec<(String, u64)>,
    pub successes: u64,
    pub failures: u64,
}

pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &NewAuditEntry) -> Result<i64>;

    /// Matching entries, newest first.
    fn query(&self, filter: &AuditFilter, limit: usize, offset: usize) -> Result<Vec<AuditEntry>>;

    /// Delete entries older than `cutoff`; returns how many went.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    fn stats(&self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>)
        -> Result<AuditStats>;
}

/// SQLite-backed audit log.
#[derive(Clone)]
pub struct AuditLog {
    db: Database,
}

type SqlParams = Vec<Box<dyn rusqlite::types::ToSql>>;

fn time_range_clause(
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    clauses: &mut Vec<String>,
    params: &mut SqlParams,
) {
    if let Some(ts) = since {
        params.push(Box::new(encode_ts(&ts)));
        clauses.push(format!("timestamp >= ?{}", params.len()));
    }
    if let Some(ts) = until {
        params.push(Box::new(encode_ts(&ts)));
        clauses.push(format!("timestamp <= ?{}", params.len()));
    }
}

fn where_sql(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

impl AuditLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
        let ts: String = row.get(1)?;
        let event: String = row.get(2)?;
        Ok(AuditEntry {
            id: row.get(0)?,
            timestamp: decode_ts(1, &ts)?,
            event: event.parse().map_err(|e: LapsError| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    e.to_string().into(),
                )
            })?,
            actor: row.get(3)?,
            host: row.get(4)?,
            outcome: Outcome::from_success(row.get(5)?),
            detail: row.get(6)?,
        })
    }

    fn grouped_counts(
        &self,
        column: &str,
        where_clause: &str,
        params: &SqlParams,
        limit: Option<usize>,
    ) -> Result<Vec<(String, u64)>> {
        let limit = limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();
        let sql = format!(
            "SELECT {column}, COUNT(*) AS n FROM audit_log {where_clause}
             GROUP BY {column} ORDER BY n DESC, {column} ASC {limit}"
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| &**p).collect();
            let rows = stmt.query_map(refs.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?;
            rows.collect()
        })
    }
}

impl AuditSink for AuditLog {
    fn append(&self, entry: &NewAuditEntry) -> Result<i64> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (timestamp, event, actor, host, success, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    encode_ts(&entry.timestamp),
                    entry.event.as_str(),
                    entry.actor,
                    entry.host,
                    entry.outcome.is_success(),
                    entry.detail,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn query(&self, filter: &AuditFilter, limit: usize, offset: usize) -> Result<Vec<AuditEntry>> {
        let mut clauses = Vec::new();
        let mut params: SqlParams = Vec::new();

        if let Some(event) = filter.event {
            params.push(Box::new(event.as_str()));
            clauses.push(format!("event = ?{}", params.len()));
        }
        if let Some(actor) = &filter.actor {
            params.push(Box::new(actor.clone()));
            clauses.push(format!("actor = ?{}", params.len()));
        }
        if let Some(host) = &filter.host {
            params.push(Box::new(host.clone()));
            clauses.push(format!("host = ?{}", params.len()));
        }
        if let Some(outcome) = filter.outcome {
            params.push(Box::new(outcome.is_success()));
            clauses.push(format!("success = ?{}", params.len()));
        }
        time_range_clause(filter.since, filter.until, &mut clauses, &mut params);

        params.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        let limit_idx = params.len();
        params.push(Box::new(i64::try_from(offset).unwrap_or(i64::MAX)));
        let offset_idx = params.len();

        let sql = format!(
            "SELECT id, timestamp, event, actor, host, success, detail
             FROM audit_log {}
             ORDER BY timestamp DESC, id DESC
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
            where_sql(&clauses)
        );

        self.db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                let refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| &**p).collect();
                let rows = stmt.query_map(refs.as_slice(), Self::from_row)?;
                rows.collect()
            })
            .map_err(|e| LapsError::AuditError(format!("query: {e}")))
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM audit_log WHERE timestamp < ?1",
                [encode_ts(&cutoff)],
            )
        })
    }

    fn stats(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<AuditStats> {
        let mut clauses = Vec::new();
        let mut params: SqlParams = Vec::new();
        time_range_clause(since, until, &mut clauses, &mut params);
        let where_clause = where_sql(&clauses);

        let by_event = self.grouped_counts("event", &where_clause, &params, None)?;
        let top_actors = self.grouped_counts("actor", &where_clause, &params, Some(10))?;

        let sql = format!(
            "SELECT COALESCE(SUM(success), 0), COALESCE(SUM(1 - success), 0)
             FROM audit_log {where_clause}"
        );
        let (successes, failures) = self.db.with_conn(|conn| {
            let refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| &**p).collect();
            conn.query_row(&sql, refs.as_slice(), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
        })?;

        Ok(AuditStats {
            by_event,
            top_actors,
            successes: successes.max(0) as u64,
            failures: failures.max(0) as u64,
        })
    }
}

/// Write entries as CSV (RFC 4180 quoting) to `out`.
pub fn write_csv<W: Write>(entries: &[AuditEntry], mut out: W) -> io::Result<()> {
    writeln!(out, "Date,Event,Actor,Host,Outcome,Detail")?;
    for e in entries {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            csv_field(&encode_ts(&e.timestamp)),
            csv_field(e.event.as_str()),
            csv_field(&e.actor),
            csv_field(e.host.as_deref().unwrap_or("")),
            csv_field(&e.outcome.to_string()),
            csv_field(e.detail.as_deref().unwrap_or("")),
        )?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

//! `lapscache audit` — inspect and maintain the audit log.
//!
//! Usage:
//!   lapscache audit list                       # last 50 entries
//!   lapscache audit list --host PC01 --failures
//!   lapscache audit list --since 7d --event view
//!   lapscache audit stats --since 30d
//!   lapscache audit export -o audit.csv
//!   lapscache audit purge --older-than-days 90
//!
//! Reading the log does not need the master key; purging does, because
//! the purge is itself audited through the cache service.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::access::Capability;
use crate::audit::{write_csv, AuditEntry, AuditEvent, AuditFilter, AuditSink, AuditStats, Outcome};
use crate::cli::output;
use crate::cli::{actor, data_dir, open_database, open_service, AuditAction, Cli};
use crate::config::Settings;
use crate::errors::{LapsError, Result};

/// Upper bound on rows pulled for an export.
const EXPORT_LIMIT: usize = 1_000_000;

/// Execute an `audit` subcommand.
pub fn execute(cli: &Cli, action: &AuditAction) -> Result<()> {
    match action {
        AuditAction::List {
            last,
            offset,
            since,
            event,
            by,
            host,
            failures,
            successes,
        } => {
            actor(cli)?.require(Capability::View)?;
            let filter = AuditFilter {
                event: event.as_deref().map(str::parse::<AuditEvent>).transpose()?,
                actor: by.clone(),
                host: host.clone(),
                outcome: match (failures, successes) {
                    (true, _) => Some(Outcome::Failure),
                    (_, true) => Some(Outcome::Success),
                    _ => None,
                },
                since: since.as_deref().map(parse_duration).transpose()?,
                until: None,
            };
            list(cli, &filter, *last, *offset)
        }
        AuditAction::Stats { since } => {
            actor(cli)?.require(Capability::View)?;
            let since = since.as_deref().map(parse_duration).transpose()?;
            let stats = open_database(cli)?.audit_log().stats(since, None)?;
            print_stats(&stats);
            Ok(())
        }
        AuditAction::Export { output, since } => {
            actor(cli)?.require(Capability::View)?;
            let filter = AuditFilter {
                since: since.as_deref().map(parse_duration).transpose()?,
                ..AuditFilter::default()
            };
            export(cli, &filter, output.as_deref())
        }
        AuditAction::Purge { older_than_days } => purge(cli, *older_than_days),
    }
}

fn list(cli: &Cli, filter: &AuditFilter, last: usize, offset: usize) -> Result<()> {
    let entries = open_database(cli)?
        .audit_log()
        .query(filter, last, offset)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);
    Ok(())
}

fn export(cli: &Cli, filter: &AuditFilter, path: Option<&str>) -> Result<()> {
    let entries = open_database(cli)?
        .audit_log()
        .query(filter, EXPORT_LIMIT, 0)?;

    match path {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            write_csv(&entries, &mut out)?;
            out.flush()?;
            output::success(&format!("Exported {} entries to {path}", entries.len()));
        }
        None => {
            let stdout = io::stdout();
            write_csv(&entries, stdout.lock())?;
        }
    }
    Ok(())
}

fn purge(cli: &Cli, older_than_days: Option<u32>) -> Result<()> {
    let actor = actor(cli)?;
    actor.require(Capability::Configure)?;

    let days = match older_than_days {
        Some(days) => days,
        None => Settings::load(&data_dir(cli)?)?.audit_retention_days,
    };
    let service = open_service(cli)?;
    let removed = service.purge_audit(&actor, days)?;
    output::success(&format!(
        "Removed {removed} audit entries older than {days} days"
    ));
    Ok(())
}

/// Parse a human-friendly duration string like "7d", "24h", "30m" into
/// the instant that long ago.
fn parse_duration(input: &str) -> Result<DateTime<Utc>> {
    parse_duration_at(input, Utc::now())
}

fn parse_duration_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let invalid = |reason: &str| {
        LapsError::CommandFailed(format!("invalid duration '{input}' — {reason}"))
    };

    let (num_str, to_duration): (&str, fn(i64) -> Option<chrono::Duration>) =
        if let Some(s) = input.strip_suffix('d') {
            (s, chrono::Duration::try_days)
        } else if let Some(s) = input.strip_suffix('h') {
            (s, chrono::Duration::try_hours)
        } else if let Some(s) = input.strip_suffix('m') {
            (s, chrono::Duration::try_minutes)
        } else {
            return Err(invalid("use format like 7d, 24h, or 30m"));
        };

    let num: u32 = num_str
        .parse()
        .map_err(|_| invalid("number part must be a non-negative integer"))?;

    to_duration(i64::from(num))
        .and_then(|ago| now.checked_sub_signed(ago))
        .ok_or_else(|| invalid("too far in the past"))
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Event", "Actor", "Host", "Outcome", "Details"]);

    for entry in entries {
        let outcome = match entry.outcome {
            Outcome::Success => style("success").green().to_string(),
            Outcome::Failure => style("failure").red().to_string(),
        };
        table.add_row(vec![
            output::format_time(&entry.timestamp),
            colorize_event(entry.event),
            entry.actor.clone(),
            entry.host.clone().unwrap_or_else(|| "-".to_string()),
            outcome,
            entry.detail.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

fn print_stats(stats: &AuditStats) {
    if stats.by_event.is_empty() {
        output::info("No audit entries found.");
        return;
    }

    println!(
        "{} {}   {} {}",
        style("Successes:").bold(),
        style(stats.successes).green(),
        style("Failures:").bold(),
        style(stats.failures).red()
    );

    let mut events = Table::new();
    events.set_content_arrangement(ContentArrangement::Dynamic);
    events.set_header(vec!["Event", "Count"]);
    for (event, count) in &stats.by_event {
        events.add_row(vec![event.clone(), count.to_string()]);
    }
    println!("{events}");

    let mut actors = Table::new();
    actors.set_content_arrangement(ContentArrangement::Dynamic);
    actors.set_header(vec!["Top actors", "Entries"]);
    for (actor, count) in &stats.top_actors {
        actors.add_row(vec![actor.clone(), count.to_string()]);
    }
    println!("{actors}");
}

/// Colorize event names for display.
fn colorize_event(event: AuditEvent) -> String {
    let name = event.as_str();
    match event {
        AuditEvent::View | AuditEvent::Copy => style(name).cyan().to_string(),
        AuditEvent::PasswordSync | AuditEvent::ManualRefresh => style(name).green().to_string(),
        AuditEvent::RemoteFetchError => style(name).red().to_string(),
        AuditEvent::CacheClear | AuditEvent::AuditPurge => style(name).yellow().to_string(),
        AuditEvent::ConfigChange | AuditEvent::ConnectionTest => {
            style(name).magenta().to_string()
        }
    }
}

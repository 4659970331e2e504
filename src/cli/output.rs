//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::config::Configuration;
use crate::service::CacheEntryInfo;
use crate::store::CredentialStatus;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_opt_time(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(format_time).unwrap_or_else(|| "-".to_string())
}

pub fn colorize_status(status: CredentialStatus) -> String {
    match status {
        CredentialStatus::Fresh => style(status.as_str()).green().to_string(),
        CredentialStatus::Stale => style(status.as_str()).yellow().to_string(),
        CredentialStatus::Error => style(status.as_str()).red().to_string(),
    }
}

/// Print a table of cached hosts (Host, Status, Fetched, Expires, Last error).
pub fn print_cache_table(entries: &[CacheEntryInfo]) {
    if entries.is_empty() {
        info("No cached passwords yet.");
        tip("Run `lapscache get <HOST>` to fetch one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Host", "Status", "Fetched", "Expires", "Last error"]);

    for e in entries {
        let status = if e.has_password {
            colorize_status(e.status)
        } else {
            format!("{} (no password)", colorize_status(e.status))
        };
        table.add_row(vec![
            e.host.clone(),
            status,
            format_opt_time(e.fetched_at.as_ref()),
            format_opt_time(e.expires_at.as_ref()),
            e.last_error.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{table}");
}

/// Print the integration settings with the API key masked.
pub fn print_configuration(config: &Configuration) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Setting", "Value"]);

    let url = if config.server_url.is_empty() {
        style("(not set)").dim().to_string()
    } else {
        config.server_url.clone()
    };
    let api_key = match &config.api_key {
        Some(_) => "********".to_string(),
        None => style("(not set)").dim().to_string(),
    };
    let active = if config.is_active {
        style("yes").green().to_string()
    } else {
        style("no").red().to_string()
    };

    table.add_row(vec!["Server URL".to_string(), url]);
    table.add_row(vec!["API key".to_string(), api_key]);
    table.add_row(vec![
        "Password endpoint".to_string(),
        config.password_endpoint.clone(),
    ]);
    table.add_row(vec![
        "Connection timeout".to_string(),
        format!("{}s", config.connection_timeout_secs),
    ]);
    table.add_row(vec![
        "Cache duration".to_string(),
        format!("{}s", config.cache_ttl_secs),
    ]);
    table.add_row(vec!["Active".to_string(), active]);

    println!("{table}");
}

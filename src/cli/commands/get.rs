//! `lapscache get` — show (or copy) a host's local-administrator password.

use crate::access::Capability;
use crate::cli::output;
use crate::cli::{actor, open_service, Cli};
use crate::errors::{LapsError, Result};

/// Execute the `get` command.
pub fn execute(cli: &Cli, host: &str, refresh: bool, copy: bool, json: bool) -> Result<()> {
    let actor = actor(cli)?;
    actor.require(Capability::View)?;
    if refresh {
        actor.require(Capability::Refresh)?;
    }

    let service = open_service(cli)?;
    let view = service.get_password(&actor, host, refresh)?;

    if copy {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| LapsError::CommandFailed(format!("clipboard unavailable: {e}")))?;
        clipboard
            .set_text(view.password.as_str())
            .map_err(|e| LapsError::CommandFailed(format!("failed to copy: {e}")))?;
        service.record_copy(&actor, &view.host)?;
        output::success(&format!("Password for {} copied to clipboard", view.host));
        return Ok(());
    }

    if json {
        let body = serde_json::json!({
            "host": view.host,
            "password": view.password.as_str(),
            "expires_at": view.expires_at,
            "fetched_at": view.fetched_at,
            "status": view.status.as_str(),
            "last_error": view.last_error,
            "from_cache": view.from_cache,
        });
        let rendered = serde_json::to_string_pretty(&body)
            .map_err(|e| LapsError::SerializationError(e.to_string()))?;
        println!("{rendered}");
    } else {
        println!("{}", view.password.as_str());
    }
    service.record_view(&actor, &view.host)?;

    if let Some(err) = &view.last_error {
        output::warning(&format!("Last refresh failed: {err}"));
    }

    Ok(())
}

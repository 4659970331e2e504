//! `lapscache clear` — drop a host's cached password.

use crate::access::Capability;
use crate::cli::output;
use crate::cli::{actor, open_service, Cli};
use crate::errors::Result;

/// Execute the `clear` command.
pub fn execute(cli: &Cli, host: &str) -> Result<()> {
    let actor = actor(cli)?;
    actor.require(Capability::Refresh)?;

    let service = open_service(cli)?;
    if service.clear_cache(&actor, host)? {
        output::success(&format!("Removed cached password for {}", host.trim()));
    } else {
        output::info(&format!("No cached password for {}", host.trim()));
    }
    Ok(())
}

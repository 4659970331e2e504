//! `lapscache list` — show cached hosts and their freshness.

use crate::access::Capability;
use crate::cli::output;
use crate::cli::{actor, open_service, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    actor(cli)?.require(Capability::View)?;
    let service = open_service(cli)?;
    output::print_cache_table(&service.cached_entries()?);
    Ok(())
}

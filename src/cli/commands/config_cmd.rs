//! `lapscache config` — show, change and test the LAPS server settings.
//!
//! Usage:
//!   lapscache config show
//!   lapscache config set --url https://laps.example.com --prompt-api-key
//!   lapscache config set --ttl 900 --inactive
//!   lapscache config test --url https://staging-laps.example.com

use crate::access::Capability;
use crate::cli::output;
use crate::cli::{actor, open_service, Cli, ConfigAction, ConfigArgs};
use crate::errors::Result;

/// Execute a `config` subcommand.
pub fn execute(cli: &Cli, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show(cli),
        ConfigAction::Set(args) => set(cli, args),
        ConfigAction::Test(args) => test(cli, args),
    }
}

fn show(cli: &Cli) -> Result<()> {
    actor(cli)?.require(Capability::View)?;
    let service = open_service(cli)?;
    output::print_configuration(&service.configuration()?);
    Ok(())
}

fn set(cli: &Cli, args: &ConfigArgs) -> Result<()> {
    let actor = actor(cli)?;
    actor.require(Capability::Configure)?;

    let update = args.to_update()?;
    if update.is_empty() {
        output::info("Nothing to change.");
        output::tip("See `lapscache config set --help` for the available settings.");
        return Ok(());
    }

    let service = open_service(cli)?;
    let changed = service.update_configuration(&actor, &update)?;
    if changed.is_empty() {
        output::info("Configuration unchanged.");
    } else {
        output::success(&format!("Updated {}", changed.join(", ")));
    }
    Ok(())
}

fn test(cli: &Cli, args: &ConfigArgs) -> Result<()> {
    let actor = actor(cli)?;
    actor.require(Capability::Configure)?;

    let service = open_service(cli)?;
    let (candidate, _) = args.to_update()?.apply(&service.configuration()?);
    let report = service.test_remote_connectivity(&actor, &candidate)?;

    output::success(&report.message);
    output::info(&format!("Endpoint: {}", report.endpoint));
    Ok(())
}

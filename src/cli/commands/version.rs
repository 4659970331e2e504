//! `lapscache version` — display version.

use console::style;

use crate::errors::Result;

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    println!(
        "{} {}",
        style("lapscache").bold(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

//! `lapscache completions` — print a shell completion script.
//!
//! Usage:
//!   lapscache completions bash > ~/.local/share/bash-completion/completions/lapscache
//!   lapscache completions zsh > "${fpath[1]}/_lapscache"
//!   lapscache completions fish > ~/.config/fish/completions/lapscache.fish

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::Result;

/// Execute the `completions` command.
pub fn execute(shell: Shell) -> Result<()> {
    let stdout = io::stdout();
    write_completions(shell, &mut stdout.lock())?;
    Ok(())
}

fn write_completions(shell: Shell, out: &mut dyn Write) -> io::Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
    out.flush()
}

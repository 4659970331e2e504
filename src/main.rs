use clap::Parser;
use lapscache::cli::{Cli, Commands};
use lapscache::config::Settings;

fn main() {
    let cli = Cli::parse();

    let settings = lapscache::cli::data_dir(&cli)
        .and_then(|dir| Settings::load(&dir))
        .unwrap_or_default();
    lapscache::logging::init(cli.verbose, settings.log_format);

    let result = match cli.command {
        Commands::Init { passphrase } => lapscache::cli::commands::init::execute(&cli, passphrase),
        Commands::Get {
            ref host,
            refresh,
            copy,
            json,
        } => lapscache::cli::commands::get::execute(&cli, host, refresh, copy, json),
        Commands::Clear { ref host } => lapscache::cli::commands::clear::execute(&cli, host),
        Commands::List => lapscache::cli::commands::list::execute(&cli),
        Commands::Config { ref action } => {
            lapscache::cli::commands::config_cmd::execute(&cli, action)
        }
        Commands::Audit { ref action } => {
            lapscache::cli::commands::audit_cmd::execute(&cli, action)
        }
        Commands::Version => lapscache::cli::commands::version::execute(),
        Commands::Completions { shell } => lapscache::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        lapscache::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use zeroize::Zeroizing;

use crate::access::{Actor, Role};
use crate::config::{ConfigUpdate, SecretUpdate, Settings};
use crate::crypto::{derive_master_key_with_params, load_keyfile, MasterKey};
use crate::errors::{LapsError, Result};
use crate::remote::LapsClient;
use crate::service::{PasswordCacheService, META_KDF_SALT};
use crate::store::{Database, DB_FILE_NAME};

/// Minimum passphrase length to prevent trivially weak passphrases.
const MIN_PASSPHRASE_LEN: usize = 8;

/// Name of the random master key file inside the data directory.
pub const KEYFILE_NAME: &str = "master.key";

/// Environment variable consulted before prompting for the passphrase.
pub const PASSPHRASE_ENV: &str = "LAPSCACHE_PASSPHRASE";

/// lapscache: cached, audited access to LAPS local-administrator passwords.
#[derive(Parser)]
#[command(
    name = "lapscache",
    about = "Cached, audited access to LAPS local-administrator passwords",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (default: .lapscache)
    #[arg(long, default_value = ".lapscache", env = "LAPSCACHE_DIR", global = true)]
    pub data_dir: String,

    /// Identity recorded in the audit log (default: $USER)
    #[arg(long, env = "LAPSCACHE_ACTOR", global = true)]
    pub actor: Option<String>,

    /// Role of the acting user: viewer, operator or admin
    #[arg(long, default_value = "admin", env = "LAPSCACHE_ROLE", global = true)]
    pub role: String,

    /// Show debug output on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create the data directory, database and master key
    Init {
        /// Protect the master key with a passphrase instead of a key file
        #[arg(long)]
        passphrase: bool,
    },

    /// Show the local-administrator password of a host
    Get {
        /// Host (computer) name
        host: String,
        /// Bypass the cache and ask the LAPS server
        #[arg(short, long)]
        refresh: bool,
        /// Copy to the clipboard instead of printing
        #[arg(short, long, conflicts_with = "json")]
        copy: bool,
        /// Print password and metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a host's cached password
    Clear {
        /// Host (computer) name
        host: String,
    },

    /// List cached hosts (never shows passwords)
    List,

    /// Show or change the LAPS server settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect and maintain the audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Show version
    Version,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands.
#[derive(clap::Subcommand)]
pub enum ConfigAction {
    /// Show the current settings (API key masked)
    Show,

    /// Change one or more settings
    Set(ConfigArgs),

    /// Probe the LAPS server, optionally with unsaved overrides
    Test(ConfigArgs),
}

/// Settings that `config set` and `config test` accept.
#[derive(clap::Args, Debug, Default)]
pub struct ConfigArgs {
    /// LAPS server base URL
    #[arg(long)]
    pub url: Option<String>,

    /// LAPS API key (prefer --prompt-api-key to keep it out of shell history)
    #[arg(long, conflicts_with_all = ["prompt_api_key", "clear_api_key"])]
    pub api_key: Option<String>,

    /// Prompt for the API key
    #[arg(long, conflicts_with = "clear_api_key")]
    pub prompt_api_key: bool,

    /// Remove the stored API key
    #[arg(long)]
    pub clear_api_key: bool,

    /// Connection timeout in seconds (5-300)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Cache duration in seconds (60-3600)
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Password endpoint path below the server URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Enable the integration
    #[arg(long, conflicts_with = "inactive")]
    pub active: bool,

    /// Disable the integration
    #[arg(long)]
    pub inactive: bool,
}

impl ConfigArgs {
    /// Turn the flags into a partial update, prompting for the API key
    /// if asked to.
    pub fn to_update(&self) -> Result<ConfigUpdate> {
        let api_key = if let Some(key) = &self.api_key {
            SecretUpdate::Replace(Zeroizing::new(key.clone()))
        } else if self.prompt_api_key {
            SecretUpdate::Replace(prompt_secret("LAPS API key")?)
        } else if self.clear_api_key {
            SecretUpdate::Clear
        } else {
            SecretUpdate::Keep
        };

        let is_active = match (self.active, self.inactive) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        Ok(ConfigUpdate {
            server_url: self.url.clone(),
            api_key,
            password_endpoint: self.endpoint.clone(),
            connection_timeout_secs: self.timeout,
            cache_ttl_secs: self.ttl,
            is_active,
        })
    }
}

/// Audit subcommands.
#[derive(clap::Subcommand)]
pub enum AuditAction {
    /// Show audit entries, newest first
    List {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Skip this many entries
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
        /// Only this event kind (e.g. view, remote-fetch-error)
        #[arg(long)]
        event: Option<String>,
        /// Only entries by this actor
        #[arg(long)]
        by: Option<String>,
        /// Only entries about this host
        #[arg(long)]
        host: Option<String>,
        /// Only failed actions
        #[arg(long, conflicts_with = "successes")]
        failures: bool,
        /// Only successful actions
        #[arg(long)]
        successes: bool,
    },

    /// Count entries per event, actor and outcome
    Stats {
        /// Only entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Export entries as CSV
    Export {
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Only entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Delete entries older than the retention period
    Purge {
        /// Retention in days (default: audit_retention_days from lapscache.toml)
        #[arg(long)]
        older_than_days: Option<u32>,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Absolute path of the data directory.
pub fn data_dir(cli: &Cli) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(&cli.data_dir))
}

/// The acting user: `--actor`, else `$USER`/`$USERNAME`.
pub fn actor(cli: &Cli) -> Result<Actor> {
    let identity = cli
        .actor
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let role: Role = cli.role.parse()?;
    Ok(Actor::new(identity.trim(), role))
}

/// Open the database of an initialized data directory.
pub fn open_database(cli: &Cli) -> Result<Database> {
    let dir = data_dir(cli)?;
    let path = dir.join(DB_FILE_NAME);
    if !path.exists() {
        return Err(LapsError::NotInitialized(dir));
    }
    Database::open(&path)
}

/// Open the database and unlock the cache service.
pub fn open_service(cli: &Cli) -> Result<PasswordCacheService> {
    let dir = data_dir(cli)?;
    let db = open_database(cli)?;
    let settings = Settings::load(&dir)?;
    let key = unlock(&dir, &db, &settings)?;
    PasswordCacheService::open(&db, LapsClient::new(), key)
}

/// Load the master key: the key file if there is one, otherwise derive
/// it from the passphrase and the stored salt.
pub fn unlock(dir: &Path, db: &Database, settings: &Settings) -> Result<MasterKey> {
    let keyfile = dir.join(KEYFILE_NAME);
    if keyfile.exists() {
        return load_keyfile(&keyfile);
    }

    let salt = db
        .meta_get(META_KDF_SALT)?
        .ok_or_else(|| LapsError::NotInitialized(dir.to_path_buf()))?;
    let passphrase = prompt_passphrase()?;
    derive_master_key_with_params(passphrase.as_bytes(), &salt, &settings.argon2_params())
}

/// Get the passphrase, trying in order:
/// 1. `LAPSCACHE_PASSPHRASE` env var (scripts, CI)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the passphrase is wiped from memory on drop.
pub fn prompt_passphrase() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSPHRASE_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }
    prompt_secret("Enter lapscache passphrase")
}

/// Prompt for a new passphrase with confirmation (used during `init`).
///
/// Also respects `LAPSCACHE_PASSPHRASE` for scripted usage.
/// Enforces a minimum length.
pub fn prompt_new_passphrase() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSPHRASE_ENV) {
        if !pw.is_empty() {
            check_passphrase_len(&pw)?;
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let passphrase = Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt("Choose lapscache passphrase")
                .with_confirmation(
                    "Confirm passphrase",
                    "Passphrases do not match, try again",
                )
                .interact()
                .map_err(|e| LapsError::CommandFailed(format!("passphrase prompt: {e}")))?,
        );

        if check_passphrase_len(&passphrase).is_err() {
            output::warning(&format!(
                "Passphrase must be at least {MIN_PASSPHRASE_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(passphrase);
    }
}

fn check_passphrase_len(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(LapsError::CommandFailed(format!(
            "passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
        )));
    }
    Ok(())
}

fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let value = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| LapsError::CommandFailed(format!("{prompt}: {e}")))?;
    Ok(Zeroizing::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lapscache").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["get", "PC01", "--actor", "alice", "--role", "viewer"]);
        let actor = actor(&cli).unwrap();
        assert_eq!(actor.identity, "alice");
        assert_eq!(actor.role, Role::Viewer);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let cli = parse(&["list", "--role", "root"]);
        assert!(actor(&cli).is_err());
    }

    #[test]
    fn config_args_build_update() {
        let args = ConfigArgs {
            url: Some("https://laps".into()),
            api_key: Some("k-1".into()),
            ttl: Some(600),
            inactive: true,
            ..ConfigArgs::default()
        };
        let update = args.to_update().unwrap();
        assert_eq!(update.server_url.as_deref(), Some("https://laps"));
        assert_eq!(
            update.api_key,
            SecretUpdate::Replace(Zeroizing::new("k-1".into()))
        );
        assert_eq!(update.cache_ttl_secs, Some(600));
        assert_eq!(update.is_active, Some(false));
    }

    #[test]
    fn clear_api_key_flag() {
        let args = ConfigArgs {
            clear_api_key: true,
            ..ConfigArgs::default()
        };
        assert_eq!(args.to_update().unwrap().api_key, SecretUpdate::Clear);
        assert!(ConfigArgs::default().to_update().unwrap().is_empty());
    }

    #[test]
    fn api_key_conflicts_with_clear() {
        let result = Cli::try_parse_from([
            "lapscache",
            "config",
            "set",
            "--api-key",
            "x",
            "--clear-api-key",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn short_passphrase_is_rejected() {
        assert!(check_passphrase_len("short").is_err());
        assert!(check_passphrase_len("long enough").is_ok());
    }
}

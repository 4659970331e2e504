//! `lapscache init` — create the data directory, database and master key.

use std::fs;

use crate::cli::output;
use crate::cli::{data_dir, prompt_new_passphrase, Cli, KEYFILE_NAME};
use crate::config::Settings;
use crate::crypto::{derive_master_key_with_params, generate_keyfile, generate_salt};
use crate::errors::{LapsError, Result};
use crate::remote::LapsClient;
use crate::service::{PasswordCacheService, META_KDF_SALT};
use crate::store::{Database, DB_FILE_NAME};

/// Execute the `init` command.
pub fn execute(cli: &Cli, passphrase: bool) -> Result<()> {
    let dir = data_dir(cli)?;
    let db_path = dir.join(DB_FILE_NAME);

    // 1. Refuse to touch an existing installation.
    if db_path.exists() {
        output::tip("Use `lapscache config show` to inspect the existing setup.");
        return Err(LapsError::AlreadyInitialized(dir));
    }

    // 2. Create the data directory (owner-only on Unix).
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }
        output::info(&format!("Created data directory: {}", dir.display()));
    }

    // 3. Master key: passphrase-derived, or a random key file.
    let settings = Settings::load(&dir)?;
    let db = Database::open(&db_path)?;
    let key = if passphrase {
        let passphrase = prompt_new_passphrase()?;
        let salt = generate_salt();
        db.meta_set(META_KDF_SALT, &salt)?;
        derive_master_key_with_params(passphrase.as_bytes(), &salt, &settings.argon2_params())?
    } else {
        generate_keyfile(&dir.join(KEYFILE_NAME))?
    };

    // 4. Record the key check value.
    PasswordCacheService::initialize(&db, LapsClient::new(), key)?;

    if passphrase {
        output::success(&format!(
            "Initialized passphrase-protected cache at {}",
            dir.display()
        ));
    } else {
        output::success(&format!("Initialized cache at {}", dir.display()));
        output::warning(&format!(
            "Keep {} private: it unlocks every cached password.",
            dir.join(KEYFILE_NAME).display()
        ));
    }

    output::tip("Run `lapscache config set --url <URL> --prompt-api-key` to connect a LAPS server.");
    output::tip("Run `lapscache config test` to check the connection.");

    Ok(())
}

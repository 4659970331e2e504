//! Random master key files.
//!
//! `lapscache init` writes 32 random bytes to `<data_dir>/master.key`
//! with owner-only permissions. Every later command reads it back to
//! unlock the cache, unless the directory was set up with a passphrase.

use std::fs;
use std::path::Path;

use rand::RngCore;

use crate::crypto::keys::{MasterKey, KEY_LEN};
use crate::errors::{LapsError, Result};

/// Generate a new master key and write it to `path`.
pub fn generate_keyfile(path: &Path) -> Result<MasterKey> {
    if path.exists() {
        return Err(LapsError::KeyfileError(format!(
            "key file already exists at {}",
            path.display()
        )));
    }

    let mut bytes = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut bytes);

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                LapsError::KeyfileError(format!("cannot create key file directory: {e}"))
            })?;
        }
    }

    let written = fs::write(path, bytes);
    let key = MasterKey::new(bytes);
    zeroize::Zeroize::zeroize(&mut bytes);
    written.map_err(|e| LapsError::KeyfileError(format!("failed to write key file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            LapsError::KeyfileError(format!("failed to set key file permissions: {e}"))
        })?;
    }

    Ok(key)
}

/// Load a master key from `path`.
pub fn load_keyfile(path: &Path) -> Result<MasterKey> {
    if !path.exists() {
        return Err(LapsError::KeyfileError(format!(
            "key file not found at {}",
            path.display()
        )));
    }

    let mut data = fs::read(path)
        .map_err(|e| LapsError::KeyfileError(format!("failed to read key file: {e}")))?;
    let key = MasterKey::from_slice(&data);
    zeroize::Zeroize::zeroize(&mut data);
    key
}

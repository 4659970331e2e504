//! Passphrase-based master key derivation (Argon2id).
//!
//! Used when the data directory was initialised with `--passphrase`
//! instead of a random key file. The salt lives in the database `meta`
//! table; the cost parameters come from `Settings`.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::crypto::keys::{MasterKey, KEY_LEN};
use crate::errors::{LapsError, Result};

/// Length of the KDF salt in bytes.
pub const SALT_LEN: usize = 32;

/// Lowest memory cost we accept (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Derive a master key with the default Argon2id parameters.
pub fn derive_master_key(passphrase: &[u8], salt: &[u8]) -> Result<MasterKey> {
    derive_master_key_with_params(passphrase, salt, &Argon2Params::default())
}

/// Derive a master key from a passphrase and salt.
///
/// Rejects parameters weak enough to make offline guessing cheap.
pub fn derive_master_key_with_params(
    passphrase: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<MasterKey> {
    if passphrase.is_empty() {
        return Err(LapsError::KeyDerivationFailed(
            "passphrase must not be empty".into(),
        ));
    }
    if argon2_params.memory_kib < MIN_MEMORY_KIB {
        return Err(LapsError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            argon2_params.memory_kib
        )));
    }
    if argon2_params.iterations < 1 || argon2_params.parallelism < 1 {
        return Err(LapsError::KeyDerivationFailed(
            "Argon2 iterations and parallelism must be at least 1".into(),
        ));
    }

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| LapsError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let mut raw = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(passphrase, salt, &mut raw)
        .map_err(|e| LapsError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    let key = MasterKey::new(raw);
    zeroize::Zeroize::zeroize(&mut raw);
    Ok(key)
}

/// Generate a random salt for a new passphrase-protected database.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

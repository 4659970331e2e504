//! Master key handling and HKDF-SHA256 sub-keys.
//!
//! The master key never encrypts anything directly. Each cached host
//! gets its own key (`info = "lapscache-host:<host>"`), the stored API
//! key gets another, and a keyed check value lets us reject a wrong
//! master key before touching any ciphertext.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{LapsError, Result};

/// Length of the master key and every derived sub-key (256 bits).
pub const KEY_LEN: usize = 32;

const CHECK_LABEL: &[u8] = b"lapscache-key-check-v1";

/// Derive the encryption key for one host's cached password.
pub fn derive_host_key(master_key: &[u8], host: &str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let info = format!("lapscache-host:{host}");
    hkdf_expand(master_key, info.as_bytes())
}

/// Derive the encryption key for the stored LAPS API key.
pub fn derive_api_key_key(master_key: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    hkdf_expand(master_key, b"lapscache-api-key")
}

fn hkdf_expand(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    // The master key is uniformly random (key file or Argon2id output),
    // so the extract step runs with an empty salt.
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| LapsError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

/// A 32-byte master key that wipes itself on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a master key from a byte slice, e.g. the contents of a key file.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            LapsError::KeyfileError(format!(
                "master key must be exactly {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        let key = Self::new(raw);
        raw.zeroize();
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub fn host_key(&self, host: &str) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        derive_host_key(&self.bytes, host)
    }

    pub fn api_key_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        derive_api_key_key(&self.bytes)
    }

    /// HMAC-SHA256 check value stored next to the data it protects.
    pub fn check_value(&self) -> Result<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.bytes)
            .map_err(|e| LapsError::KeyDerivationFailed(format!("HMAC init failed: {e}")))?;
        mac.update(CHECK_LABEL);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Compare against a stored check value in constant time.
    pub fn verify_check_value(&self, expected: &[u8]) -> Result<()> {
        let actual = self.check_value()?;
        if actual.as_slice().ct_eq(expected).into() {
            Ok(())
        } else {
            Err(LapsError::WrongMasterKey)
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_keys_differ_per_host() {
        let master = [0x42u8; KEY_LEN];
        let a = derive_host_key(&master, "PC01").unwrap();
        let b = derive_host_key(&master, "PC02").unwrap();
        assert_ne!(*a, *b);
        assert_eq!(*a, *derive_host_key(&master, "PC01").unwrap());
    }

    #[test]
    fn api_key_key_differs_from_host_keys() {
        let master = [0x42u8; KEY_LEN];
        let api = derive_api_key_key(&master).unwrap();
        let host = derive_host_key(&master, "api-key").unwrap();
        assert_ne!(*api, *host);
    }

    #[test]
    fn check_value_accepts_same_key_only() {
        let key = MasterKey::new([1u8; KEY_LEN]);
        let check = key.check_value().unwrap();
        assert!(key.verify_check_value(&check).is_ok());

        let other = MasterKey::new([2u8; KEY_LEN]);
        assert!(matches!(
            other.verify_check_value(&check),
            Err(LapsError::WrongMasterKey)
        ));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(MasterKey::from_slice(&[0u8; 16]).is_err());
        assert!(MasterKey::from_slice(&[0u8; KEY_LEN]).is_ok());
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let key = MasterKey::new([9u8; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "MasterKey([REDACTED])");
    }
}

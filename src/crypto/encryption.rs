//! AES-256-GCM sealing of cached secrets.
//!
//! Every blob carries its own random 12-byte nonce, and is bound to a
//! context string (the host identifier, or the configuration slot) via
//! the AEAD associated data, so a ciphertext copied into another row
//! fails to open.
//!
//! Layout of a sealed blob:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{LapsError, Result};

const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under a 32-byte `key`, binding it to `context`.
pub fn encrypt(key: &[u8], context: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| LapsError::EncryptionFailed(format!("invalid key length: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let sealed = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: context,
            },
        )
        .map_err(|e| LapsError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(blob)
}

/// Open a blob produced by [`encrypt`] with the same key and context.
pub fn decrypt(key: &[u8], context: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(LapsError::DecryptionFailed);
    }
    let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| LapsError::DecryptionFailed)?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: sealed,
                aad: context,
            },
        )
        .map_err(|_| LapsError::DecryptionFailed)
}

/// Decrypt a blob that is known to hold UTF-8 text (a password or API key).
///
/// The plaintext never lives outside a `Zeroizing` buffer.
pub fn decrypt_string(key: &[u8], context: &[u8], blob: &[u8]) -> Result<Zeroizing<String>> {
    let bytes = decrypt(key, context, blob)?;
    String::from_utf8(bytes).map(Zeroizing::new).map_err(|e| {
        let mut bad = e.into_bytes();
        bad.zeroize();
        LapsError::SerializationError("decrypted value is not valid UTF-8".to_string())
    })
}

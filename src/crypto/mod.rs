//! Cryptographic primitives for lapscache.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id passphrase-based master key derivation (`kdf`)
//! - HKDF-based per-host and API-key sub-key derivation (`keys`)
//! - Random master key files (`keyfile`)

pub mod encryption;
pub mod kdf;
pub mod keyfile;
pub mod keys;

pub use encryption::{decrypt, encrypt};
pub use kdf::{derive_master_key, derive_master_key_with_params, generate_salt, Argon2Params};
pub use keyfile::{generate_keyfile, load_keyfile};
pub use keys::{derive_api_key_key, derive_host_key, MasterKey};

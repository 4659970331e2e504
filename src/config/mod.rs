//! Configuration.
//!
//! - `settings`: local, file-based settings for this installation
//!   (`<data_dir>/lapscache.toml`).
//! - `integration`: the LAPS server integration row persisted in the
//!   database and edited through `config set`.

pub mod integration;
pub mod settings;

pub use integration::{ConfigUpdate, Configuration, SecretUpdate};
pub use settings::{LogFormat, Settings};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::Argon2Params;
use crate::errors::{LapsError, Result};

/// Output format for the process log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installation-level settings, loaded from `<data_dir>/lapscache.toml`.
///
/// Every field has a default so lapscache works without any settings
/// file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Audit entries older than this are removed by `audit purge`.
    #[serde(default = "default_audit_retention_days")]
    pub audit_retention_days: u32,

    /// Process log format on stderr.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Argon2 memory cost in KiB for passphrase-protected data dirs.
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_audit_retention_days() -> u32 {
    90
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            audit_retention_days: default_audit_retention_days(),
            log_format: LogFormat::default(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    pub const FILE_NAME: &'static str = "lapscache.toml";

    /// Load settings from `<data_dir>/lapscache.toml`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            LapsError::ConfigError(format!("Failed to parse {}: {e}", path.display()))
        })?;

        if settings.audit_retention_days == 0 {
            return Err(LapsError::ConfigError(
                "audit_retention_days must be at least 1".into(),
            ));
        }

        Ok(settings)
    }

    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(Self::FILE_NAME)
    }

    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

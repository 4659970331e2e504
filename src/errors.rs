use std::path::PathBuf;
use thiserror::Error;

/// Classified outcome of a failed call to the LAPS server.
///
/// Kept separate from `LapsError` so callers can match on the exact
/// failure (e.g. back off on a timeout, re-enter the key on a 401)
/// after it has been wrapped by the cache service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("connection to LAPS server timed out")]
    ConnectionTimeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("LAPS server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("LAPS server rejected the API key")]
    InvalidApiKey,

    #[error("LAPS server rejected the request: {0}")]
    RemoteRejected(String),

    #[error("invalid response from LAPS server: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Whether a caller may reasonably try the same request again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionTimeout | Self::Connection(_) => true,
            Self::HttpStatus(code) => *code >= 500,
            _ => false,
        }
    }
}

/// All errors that can occur in lapscache.
#[derive(Debug, Error)]
pub enum LapsError {
    // --- Service errors ---
    #[error("LAPS integration is not active")]
    Inactive,

    #[error("LAPS integration is not configured: {0}")]
    NotConfigured(String),

    #[error("password fetch failed: {0}")]
    RemoteFetchFailed(RemoteError),

    #[error(transparent)]
    Remote(RemoteError),

    #[error("invalid host identifier: {0}")]
    InvalidHost(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("permission denied: '{actor}' may not {action}")]
    PermissionDenied { actor: String, action: String },

    // --- Storage errors ---
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("no lapscache data found at {0} (run `lapscache init` first)")]
    NotInitialized(PathBuf),

    #[error("lapscache data already exists at {0}")]
    AlreadyInitialized(PathBuf),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong master key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("master key does not match this database")]
    WrongMasterKey,

    #[error("Keyfile error: {0}")]
    KeyfileError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Audit error: {0}")]
    AuditError(String),
}

impl From<rusqlite::Error> for LapsError {
    fn from(e: rusqlite::Error) -> Self {
        LapsError::Persistence(e.to_string())
    }
}

impl LapsError {
    /// The remote classification behind this error, if it came from the server.
    pub fn remote_kind(&self) -> Option<&RemoteError> {
        match self {
            Self::RemoteFetchFailed(e) | Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience type alias for lapscache results.
pub type Result<T> = std::result::Result<T, LapsError>;

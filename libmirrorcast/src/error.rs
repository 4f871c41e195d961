//! Error types for Mirrorcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// A ledger insert hit an already recorded source id. This means the
    /// ledger filter let a mirrored post through, or two writers raced.
    #[error("Ledger constraint violated: {0}")]
    ConstraintViolation(String),
}

impl MirrorError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            MirrorError::Config(ConfigError::Validation { .. }) => 3,
            MirrorError::Platform(PlatformError::Authentication(_)) => 2,
            MirrorError::Config(_) => 1,
            MirrorError::Storage(_) => 1,
            MirrorError::Platform(_) => 1,
            MirrorError::ConstraintViolation(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// `index` is 1-based, matching the position in the `entries` array.
    #[error("Entry {index} (name: {}) is missing keys {}", .name.as_deref().unwrap_or("unnamed"), .missing.join(", "))]
    Validation {
        index: usize,
        name: Option<String>,
        missing: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content rejected: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}

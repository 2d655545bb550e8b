//! Core error types for quizalarm-core.
//!
//! The taxonomy follows how each failure is handled at runtime:
//! validation failures skip a record, storage failures are logged and
//! retried on the next poll, audio failures never affect gate state.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for quizalarm-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Audio backend errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Malformed Alarm or Problem record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Alarm time is not a well-formed "HH:MM"
    #[error("Invalid alarm time '{0}': expected HH:MM (00-23:00-59)")]
    InvalidTime(String),

    /// Volume outside the unit interval
    #[error("Volume {0} out of range: must be within 0.0..=1.0")]
    VolumeOutOfRange(f64),

    /// Required field absent from a record
    #[error("Record '{record}' is missing required field '{field}'")]
    MissingField { record: String, field: String },

    /// Quiz problem without options
    #[error("Problem '{0}' has no options")]
    EmptyOptions(String),

    /// Option lacking its id or content
    #[error("Problem '{problem}' has an option without '{field}'")]
    OptionMissingField { problem: String, field: String },

    /// Quiz problem without any correct answer
    #[error("Problem '{0}' has no correct answers")]
    EmptyCorrectAnswers(String),

    /// Correct answer referencing an option id that does not exist
    #[error("Problem '{problem}' lists correct answer '{option}' which is not an option id")]
    UnknownCorrectAnswer { problem: String, option: String },

    /// Problem type without a known representation
    #[error("Unsupported problem type: {0}")]
    UnsupportedProblemType(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored record no longer passes validation
    #[error("Stored record '{id}' is corrupt: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: ValidationError,
    },
}

/// Audio backend errors. Always best-effort.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No command-line player could be found for this platform
    #[error("No audio player available on this system")]
    NoPlayer,

    /// Neither the requested nor the fallback sound exists
    #[error("Sound file not found: {0}")]
    SoundMissing(PathBuf),

    /// Spawning the player process failed
    #[error("Failed to spawn audio player: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key not present in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::QueryFailed(format!("JSON column: {err}"))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

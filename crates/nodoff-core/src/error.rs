//! Core error types for nodoff-core.
//!
//! The engine's state transitions are total and never fail; errors only
//! arise at the edges, when chapter tables, selections, configuration or
//! book catalogs are built from outside input.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for nodoff-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session task has stopped
    #[error("playback session closed")]
    SessionClosed,

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
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

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Chapter whose end does not come after its start
    #[error("Invalid chapter {id}: end ({end}) must be greater than start ({start})")]
    InvalidChapter { id: i64, start: f64, end: f64 },

    /// Two chapters overlap or are out of order
    #[error("Chapter {next} starts before chapter {previous} ends")]
    OverlappingChapters { previous: i64, next: i64 },

    /// Unparseable timer selection
    #[error("Invalid timer selection: {0}")]
    InvalidSelection(String),

    /// Unparseable time of day
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

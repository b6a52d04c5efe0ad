//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file at {path}: {source}")]
    FileRead {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write configuration file
    #[error("Failed to write config file at {path}: {source}")]
    FileWrite {
        /// File that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML configuration
    #[error("Failed to serialize TOML config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Failed to parse JSON (genesis)
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid chain ID (must be non-zero)
    #[error("Invalid chain ID: chain_id must be non-zero")]
    InvalidChainId,

    /// Block interval at or below the minimum
    #[error("Invalid block interval: must be above {min}ms, got {value}ms")]
    InvalidBlockInterval {
        /// Configured value
        value: u64,
        /// Exclusive lower bound
        min: u64,
    },

    /// Invalid timeout configuration
    #[error("Invalid timeout: {name} must be positive, got {value}")]
    InvalidTimeout {
        /// Field name
        name: &'static str,
        /// Configured value
        value: u64,
    },

    /// A size or count parameter is zero
    #[error("Invalid {name}: must be non-zero")]
    ZeroLimit {
        /// Field name
        name: &'static str,
    },

    /// Invalid public key format
    #[error("Invalid bookkeeper public key {key}: {reason}")]
    InvalidPubkey {
        /// Offending key as written
        key: String,
        /// Parser message
        reason: String,
    },

    /// Duplicate genesis bookkeeper
    #[error("Duplicate genesis bookkeeper: {0}")]
    DuplicateBookkeeper(String),

    /// No genesis bookkeepers configured
    #[error("No genesis bookkeepers configured: at least one bookkeeper required")]
    NoBookkeepers,

    /// Invalid log level
    #[error("Invalid log level: {0}. Valid values: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Invalid log format
    #[error("Invalid log format: {0}. Valid values: text, json, compact")]
    InvalidLogFormat(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

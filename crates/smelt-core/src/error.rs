//! Error types for smelt-core

use thiserror::Error;

/// Result type alias using smelt-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for smelt
#[derive(Error, Debug)]
pub enum Error {
    /// Network or filesystem failure resolving a source reference
    #[error("failed to fetch {location}: {cause}")]
    Fetch { location: String, cause: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// One or more sources failed to parse under strict policy
    #[error("{count} configuration source error(s); aborting because strict mode is enabled")]
    StrictPolicy { count: usize },
}

impl Error {
    /// Create a fetch error from any underlying cause
    pub fn fetch(location: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Fetch {
            location: location.into(),
            cause: cause.to_string(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a strict-policy rejection for the given diagnostic count
    pub fn strict_policy(count: usize) -> Self {
        Self::StrictPolicy { count }
    }
}

//! CLI error types and conversions

use crate::config::ConfigError;
use crate::{ErrorClass, ExtractError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The extraction run failed
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Result could not be written to stdout
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Failure class, when the error maps to one
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            CliError::Extract(e) => Some(e.class()),
            CliError::Config(_) | CliError::InvalidArgument(_) => Some(ErrorClass::Config),
            CliError::Serialization(_) => None,
        }
    }
}

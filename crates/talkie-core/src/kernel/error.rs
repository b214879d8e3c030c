//! # Talkie Core Kernel Errors
//!
//! Defines the top-level [`Error`] that wraps every subsystem error, so hosts
//! can propagate startup failures with a single `?`.
use thiserror::Error as ThisError;

use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Plugin wiring failed
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Configuration could not be read or parsed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

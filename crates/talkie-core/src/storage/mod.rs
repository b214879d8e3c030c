//! # Talkie Core Storage
//!
//! Configuration files: formats, the in-memory [`ConfigData`] map and the
//! [`ConfigLoader`] that finds application and plugin configuration on disk.
pub mod config;
pub mod error;

pub use config::{ConfigData, ConfigFormat, ConfigLoader, PluginConfigScope};
pub use error::StorageError;

// Test module declaration
#[cfg(test)]
mod tests;

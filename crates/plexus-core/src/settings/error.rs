//! # Plexus Settings Errors
//!
//! Errors raised while reading or writing an engine configuration file.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization to '{format}' failed: {message}")]
    Serialization { format: String, message: String },

    #[error("Deserialization from '{format}' failed: {message}")]
    Deserialization { format: String, message: String },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

impl SettingsError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        SettingsError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }
}

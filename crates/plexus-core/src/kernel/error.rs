//! # Plexus Core Errors
//!
//! Defines the crate-wide error type.
//!
//! [`Error`] wraps the typed errors of each subsystem so callers that drive
//! both the plugin engine and the aggregation registry can use a single
//! `Result` alias. Per-plugin failures during a load run are *not* reported
//! through this type; they are recorded on the affected
//! [`PluginSpec`](crate::plugin_system::PluginSpec) instead.
use std::result::Result as StdResult;

use crate::aggregation::error::AggregationError;
use crate::plugin_system::error::PluginSystemError;
use crate::settings::error::SettingsError;
use thiserror::Error as ThisError;

/// Custom error type for the Plexus core
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Aggregation registry error
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Engine configuration error
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

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

impl From<crate::plugin_system::dependency::DependencyError> for Error {
    fn from(err: crate::plugin_system::dependency::DependencyError) -> Self {
        Error::PluginSystem(PluginSystemError::DependencyResolution(err))
    }
}

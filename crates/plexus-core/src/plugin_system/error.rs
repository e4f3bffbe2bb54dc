//! # Plexus Plugin System Errors
//!
//! Defines error types specific to the Plexus Plugin System.
//!
//! [`PluginSystemError`] covers misuse of the engine API (unknown or duplicate
//! plugins, calls in the wrong lifecycle state) and failures that end a whole
//! operation, such as asynchronous shutdowns that timed out. Errors that only
//! concern one plugin during a load run are recorded on its
//! [`PluginSpec`](crate::plugin_system::PluginSpec) as a message instead of
//! being returned.
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::spec::PluginState;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin metadata error for '{plugin_id}': {message}")]
    MetadataError {
        plugin_id: String,
        message: String,
    },

    #[error("Plugin '{plugin_id}' is already registered")]
    DuplicatePlugin {
        plugin_id: String,
    },

    #[error("Plugin '{plugin_id}' not found")]
    UnknownPlugin {
        plugin_id: String,
    },

    #[error("Invalid state transition for plugin '{plugin_id}': {from} -> {to}")]
    InvalidStateTransition {
        plugin_id: String,
        from: PluginState,
        to: PluginState,
    },

    #[error("Plugin '{plugin_id}' is {state}, expected {expected}")]
    WrongState {
        plugin_id: String,
        state: PluginState,
        expected: PluginState,
    },

    #[error("Plugin '{plugin_id}' is required and cannot be disabled")]
    RequiredPlugin {
        plugin_id: String,
    },

    #[error("Plugin shutdown error for '{plugin_id}': {message}")]
    ShutdownError {
        plugin_id: String,
        message: String,
    },

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}

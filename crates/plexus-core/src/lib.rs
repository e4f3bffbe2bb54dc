//! # Plexus Core
//!
//! Extensibility core for a host application:
//!
//! - [`plugin_system`]: dependency resolution and the plugin lifecycle engine
//!   ([`PluginManager`]).
//! - [`aggregation`]: capability based composition of components
//!   ([`Aggregate`], [`query`], [`query_all`]).
//! - [`settings`]: engine configuration ([`EngineConfig`]).
//! - [`kernel`]: crate-wide errors and constants.
//!
//! Logging goes through the `log` facade; the host installs the backend.
pub mod aggregation;
pub mod kernel;
pub mod plugin_system;
pub mod settings;

pub use aggregation::{query, query_all, Aggregate, AggregationError, Component};
pub use kernel::error::{Error, Result};
pub use plugin_system::{
    factory_fn, Plugin, PluginContext, PluginDependency, PluginError, PluginManager, PluginMetadata, PluginSpec,
    PluginState, PluginSystemError, ShutdownFlag, ShutdownNotifier,
};
pub use settings::{EngineConfig, PluginSettings};

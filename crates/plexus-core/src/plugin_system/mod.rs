//! # Plexus Plugin System
//!
//! Dependency resolution and the lifecycle engine for in-process plugins.
//! Plugins arrive as parsed metadata plus a factory; the engine validates the
//! metadata, matches dependency declarations to providers, orders plugins so
//! that providers come first and takes each enabled plugin through its
//! lifecycle, then unwinds everything in reverse at shutdown.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: Plugin versions, compatibility versions and semver range
//!   constraints.
//! - **[`dependency`]**: Dependency declarations ([`PluginDependency`]) and
//!   resolution errors.
//! - **[`platform`]**: Platform specifications restricting where a plugin loads.
//! - **[`spec`]**: The per-plugin descriptor ([`PluginSpec`]) and its
//!   [`PluginState`] machine.
//! - **[`graph`]**: Provider matching, cycle handling and load order
//!   ([`DependencyGraph`]).
//! - **[`traits`]**: The [`Plugin`] trait plugins implement, and what the
//!   engine passes to it.
//! - **[`object_pool`]**: Components plugins publish for each other.
//! - **[`manager`]**: The lifecycle engine ([`PluginManager`]).
//! - **[`error`]**: Engine errors ([`PluginSystemError`]).
pub mod dependency;
pub mod error;
pub mod graph;
pub mod manager;
pub mod object_pool;
pub mod platform;
pub mod spec;
pub mod traits;
pub mod version;

pub use dependency::{DependencyError, DependencyKind, PluginDependency};
pub use error::PluginSystemError;
pub use graph::DependencyGraph;
pub use manager::PluginManager;
pub use object_pool::ObjectPool;
pub use platform::PlatformSpec;
pub use spec::{PluginMetadata, PluginSpec, PluginState, PluginStatus};
pub use traits::{factory_fn, Plugin, PluginContext, PluginError, PluginFactory, ShutdownFlag, ShutdownNotifier};
pub use version::{PluginVersion, VersionConstraint, VersionRange};

// Test module declaration
#[cfg(test)]
pub(crate) mod tests;

//! # Plexus Core Kernel
//!
//! Crate-wide plumbing shared by the plugin system, the aggregation registry
//! and the settings layer.
//!
//! - **Core Constants**: timing defaults and the host platform name, in the
//!   `constants` submodule.
//! - **Error Handling**: the crate error type ([`Error`](error::Error)) and a
//!   `Result` alias in the `error` submodule.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
// Test module declaration
#[cfg(test)]
mod tests;

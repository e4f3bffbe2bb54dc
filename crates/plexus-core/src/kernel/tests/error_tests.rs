#![cfg(test)]

use std::error::Error as StdError;
use std::path::PathBuf;

use crate::aggregation::error::AggregationError;
use crate::aggregation::{Aggregate, Component};
use crate::kernel::constants::{host_platform_name, APP_NAME, DELAYED_INITIALIZE_INTERVAL_MS};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::spec::PluginState;
use crate::settings::SettingsError;

fn fails_with_plugin_error() -> Result<()> {
    Err(PluginSystemError::UnknownPlugin {
        plugin_id: "Ghost".to_string(),
    }
    .into())
}

#[test]
fn test_plugin_system_errors_convert() {
    let err = fails_with_plugin_error().unwrap_err();
    assert!(matches!(err, Error::PluginSystem(PluginSystemError::UnknownPlugin { .. })));
    assert_eq!(err.to_string(), "Plugin system error: Plugin 'Ghost' not found");
}

#[test]
fn test_dependency_errors_convert() {
    let err: Error = DependencyError::MissingPlugin {
        name: "Core".to_string(),
        version: "1.0".to_string(),
    }
    .into();
    assert_eq!(
        err.to_string(),
        "Plugin system error: Dependency resolution failed: Could not resolve dependency 'Core(1.0)'"
    );
}

#[test]
fn test_state_errors_display() {
    let err = PluginSystemError::WrongState {
        plugin_id: "Editor".to_string(),
        state: PluginState::Resolved,
        expected: PluginState::Running,
    };
    assert_eq!(err.to_string(), "Plugin 'Editor' is Resolved, expected Running");

    let err = PluginSystemError::InvalidStateTransition {
        plugin_id: "Editor".to_string(),
        from: PluginState::Read,
        to: PluginState::Running,
    };
    assert_eq!(
        err.to_string(),
        "Invalid state transition for plugin 'Editor': Read -> Running"
    );
}

#[test]
fn test_settings_errors_keep_their_source() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: Error = SettingsError::io(io, "read", PathBuf::from("/etc/plexus/plugins.json")).into();
    assert_eq!(
        err.to_string(),
        "Settings error: I/O error during operation 'read' on path '/etc/plexus/plugins.json': gone"
    );
    let settings = err.source().expect("settings error is the source");
    assert!(settings.source().is_some());
}

fn claim_twice(component: &Component) -> Result<()> {
    let first = Aggregate::new();
    let second = Aggregate::new();
    first.add(component)?;
    second.add(component)?;
    Ok(())
}

#[test]
fn test_aggregation_errors_convert() {
    let component = Component::builder("outline").build();
    let err = claim_twice(&component).unwrap_err();
    assert!(matches!(err, Error::Aggregation(AggregationError::AlreadyOwned { .. })));
    assert!(err.to_string().starts_with("Aggregation error: Component 'outline'"));
}

#[test]
fn test_message_errors() {
    let from_str: Error = "plain failure".into();
    let from_string: Error = String::from("owned failure").into();
    assert_eq!(from_str.to_string(), "Error: plain failure");
    assert!(matches!(from_string, Error::Other(ref m) if m == "owned failure"));
}

#[test]
fn test_constants() {
    assert_eq!(APP_NAME, "Plexus");
    assert_eq!(DELAYED_INITIALIZE_INTERVAL_MS, 20);
    let platform = host_platform_name();
    assert!(platform.starts_with(std::env::consts::OS));
    assert!(platform.ends_with(&format!("({})", std::env::consts::ARCH)));
}

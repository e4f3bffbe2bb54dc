#![cfg(test)]

use super::mock_plugin::{mock_factory, new_log, Behavior};
use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::spec::{PluginMetadata, PluginSpec, PluginState};
use crate::plugin_system::version::PluginVersion;

fn read(metadata: PluginMetadata) -> PluginSpec {
    let name = metadata.name.clone();
    PluginSpec::read(metadata, mock_factory(&name, &new_log(), Behavior::default()), "linux (x86_64)")
}

#[test]
fn test_state_sequence() {
    let mut state = PluginState::Invalid;
    let mut visited = vec![state];
    while let Some(next) = state.next() {
        assert_eq!(next.previous(), Some(state));
        visited.push(next);
        state = next;
    }
    assert_eq!(visited, PluginState::ALL.to_vec());
    assert_eq!(PluginState::Invalid.previous(), None);
    assert_eq!(PluginState::Deleted.next(), None);
    assert_eq!(PluginState::Initialized.to_string(), "Initialized");
}

#[test]
fn test_valid_metadata_is_read() {
    let spec = read(PluginMetadata::new("Core", "1.2").with_compat_version("1.0"));
    assert_eq!(spec.state(), PluginState::Read);
    assert!(!spec.has_error());
    assert_eq!(spec.version(), PluginVersion::new(1, 2, 0, 0));
    assert_eq!(spec.compat_version(), PluginVersion::new(1, 0, 0, 0));
    assert!(spec.is_effectively_enabled());
    assert!(spec.instance().is_none());
}

#[test]
fn test_compat_version_defaults_to_version() {
    let spec = read(PluginMetadata::new("Core", "3.1.4"));
    assert_eq!(spec.compat_version(), spec.version());
}

#[test]
fn test_invalid_metadata() {
    let cases = vec![
        PluginMetadata::new("", "1.0"),
        PluginMetadata::new("BadVersion", "one"),
        PluginMetadata::new("BadCompat", "1.0").with_compat_version("x"),
        PluginMetadata::new("NewerCompat", "1.0").with_compat_version("2.0"),
        PluginMetadata::new("BadDependency", "1.0").with_dependency(PluginDependency::required("", "1.0")),
        PluginMetadata::new("BadConstraint", "1.0").with_dependency(PluginDependency::required("Core", ">>1")),
        PluginMetadata::new("BadPlatform", "1.0").with_platform("linux("),
    ];
    for metadata in cases {
        let name = metadata.name.clone();
        let spec = read(metadata);
        assert_eq!(spec.state(), PluginState::Invalid, "{} should be invalid", name);
        assert!(spec.has_error(), "{} should carry an error", name);
    }
}

#[test]
fn test_provides_matches_name_case_insensitively() {
    let spec = read(PluginMetadata::new("TextEditor", "1.2").with_compat_version("1.0"));

    assert!(spec.provides("texteditor", ""));
    assert!(spec.provides("TEXTEDITOR", "1.0"));
    assert!(spec.provides("TextEditor", "1.1"));
    assert!(!spec.provides("TextEditor", "1.3"));
    assert!(!spec.provides("TextEditor", "0.9"));
    assert!(spec.provides("TextEditor", ">=1.0, <2"));
    assert!(!spec.provides("TextEditor", "^2"));
    assert!(!spec.provides("Editor", ""));
    assert!(!spec.provides("TextEditor", ">>bad"));
}

#[test]
fn test_effective_enablement() {
    let mut spec = read(PluginMetadata::new("Plugin", "1.0").enabled_by_default(false));
    assert!(!spec.is_effectively_enabled());

    spec.set_enabled_indirectly(true);
    assert!(spec.is_effectively_enabled());
    spec.set_enabled_indirectly(false);

    spec.set_force_enabled(true);
    assert!(spec.is_effectively_enabled());

    spec.set_force_disabled(true);
    assert!(!spec.is_force_enabled());
    assert!(!spec.is_effectively_enabled());

    spec.set_force_disabled(false);
    spec.set_enabled_by_settings(true);
    assert!(spec.is_effectively_enabled());

    spec.update_host_platform("nowhere");
    assert!(spec.is_effectively_enabled(), "empty platform specification matches everything");
}

#[test]
fn test_platform_unavailable_is_never_enabled() {
    let mut spec = read(PluginMetadata::new("WinOnly", "1.0").with_platform("^windows"));
    assert!(!spec.is_available_for_host_platform());
    spec.set_force_enabled(true);
    spec.set_enabled_indirectly(true);
    assert!(!spec.is_effectively_enabled());

    spec.update_host_platform("windows (x86_64)");
    assert!(spec.is_effectively_enabled());
}

#[test]
fn test_experimental_and_required_defaults() {
    let experimental = read(PluginMetadata::new("Lab", "1.0").experimental(true));
    assert!(!experimental.is_enabled_by_default());
    assert!(!experimental.is_effectively_enabled());

    let required = read(PluginMetadata::new("Core", "1.0").required(true).enabled_by_default(false));
    assert!(required.is_enabled_by_default());
    assert!(required.is_effectively_enabled());
}

#[test]
fn test_set_state_only_advances_one_step() {
    let mut spec = read(PluginMetadata::new("Core", "1.0"));
    assert!(spec.set_state(PluginState::Resolved).is_ok());

    match spec.set_state(PluginState::Running) {
        Err(PluginSystemError::InvalidStateTransition { plugin_id, from, to }) => {
            assert_eq!(plugin_id, "Core");
            assert_eq!(from, PluginState::Resolved);
            assert_eq!(to, PluginState::Running);
        }
        other => panic!("Expected InvalidStateTransition, got {:?}", other),
    }
    assert!(spec.set_state(PluginState::Read).is_err());
    assert_eq!(spec.state(), PluginState::Resolved);
}

#[test]
fn test_status_snapshot_serializes() {
    let mut spec = read(PluginMetadata::new("Core", "1.0").with_category("Core"));
    spec.set_error("boom".to_string());
    let status = spec.status();
    assert_eq!(status.name, "Core");
    assert_eq!(status.version, "1.0.0");
    assert_eq!(status.error.as_deref(), Some("boom"));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "Read");
    assert_eq!(json["error"], "boom");
}

#[test]
fn test_metadata_deserializes_with_defaults() {
    let metadata: PluginMetadata = serde_json::from_str(
        r#"{
            "name": "Find",
            "version": "4.2",
            "compat_version": "4.0",
            "dependencies": [{"name": "Core", "version": "4.0"}]
        }"#,
    )
    .unwrap();
    assert!(metadata.enabled_by_default);
    assert!(!metadata.required);
    assert_eq!(metadata.dependencies, vec![PluginDependency::required("Core", "4.0")]);

    let spec = read(metadata);
    assert_eq!(spec.state(), PluginState::Read);
}

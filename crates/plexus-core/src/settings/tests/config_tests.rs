#![cfg(test)]

use std::path::Path;

use tempfile::tempdir;

use crate::plugin_system::tests::mock_plugin::{add_mock, new_log};
use crate::plugin_system::{PluginManager, PluginMetadata};
use crate::settings::{ConfigFormat, EngineConfig, PluginSettings, SettingsError};

fn sample_config() -> EngineConfig {
    let mut config = EngineConfig::new();
    config.plugins = PluginSettings {
        ignored: vec!["Welcome".to_string()],
        force_enabled: vec!["Lab".to_string()],
    };
    config.load = vec!["Debugger".to_string()];
    config.no_load = vec!["all".to_string()];
    config
        .arguments
        .insert("Editor".to_string(), vec!["-theme".to_string(), "dark".to_string()]);
    config.test_plugins = vec!["Editor".to_string()];
    config.platform = Some("linux (x86_64)".to_string());
    config.shutdown_timeout_ms = Some(2500);
    config
}

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert!(config.plugins.ignored.is_empty());
    assert!(config.load.is_empty());
    assert!(config.platform.is_none());
    assert!(config.shutdown_timeout_ms.is_none());
    assert_eq!(config.delayed_initialize_interval_ms, 20);

    // Every field is optional in a file
    let parsed = EngineConfig::deserialize("{}", ConfigFormat::Json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("plugins.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("PLUGINS.JSON")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("plugins.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("plugins")), None);
    #[cfg(feature = "yaml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("plugins.yml")), Some(ConfigFormat::Yaml));
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("plugins.toml")), Some(ConfigFormat::Toml));
}

#[test]
fn test_file_round_trip() {
    let dir = tempdir().unwrap();
    let mut files = vec!["plugins.json"];
    #[cfg(feature = "yaml-config")]
    files.push("plugins.yaml");
    #[cfg(feature = "toml-config")]
    files.push("plugins.toml");

    let config = sample_config();
    for file in files {
        let path = dir.path().join("nested").join(file);
        config.save_to_path(&path).unwrap();
        assert!(path.exists());
        let loaded = EngineConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config, "round trip through {}", file);
    }
}

#[test]
fn test_unset_options_are_not_written() {
    let json = EngineConfig::new().serialize(ConfigFormat::Json).unwrap();
    assert!(!json.contains("platform"));
    assert!(!json.contains("shutdown_timeout_ms"));
    assert!(json.contains("delayed_initialize_interval_ms"));
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plugins.ini");
    match EngineConfig::new().save_to_path(&path) {
        Err(SettingsError::UnsupportedFormat(p)) => assert!(p.ends_with("plugins.ini")),
        other => panic!("Expected UnsupportedFormat, got {:?}", other),
    }
    assert!(!path.exists());
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    match EngineConfig::load_from_path(&path) {
        Err(SettingsError::Io { operation, .. }) => assert_eq!(operation, "read"),
        other => panic!("Expected an I/O error, got {:?}", other),
    }
}

#[test]
fn test_malformed_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plugins.json");
    std::fs::write(&path, "{ \"load\": 3 }").unwrap();
    match EngineConfig::load_from_path(&path) {
        Err(SettingsError::Deserialization { format, .. }) => assert_eq!(format, "json"),
        other => panic!("Expected a deserialization error, got {:?}", other),
    }
}

#[test]
fn test_forced_enablement() {
    let mut config = EngineConfig::new();
    assert_eq!(config.forced_enablement("Editor"), None);

    config.load = vec!["all".to_string()];
    assert_eq!(config.forced_enablement("Editor"), Some(true));

    config.no_load = vec!["Editor".to_string()];
    assert_eq!(config.forced_enablement("Editor"), Some(false));
    assert_eq!(config.forced_enablement("Other"), Some(true));

    // A named entry beats the keyword
    config.load = vec!["Editor".to_string()];
    config.no_load = vec!["ALL".to_string()];
    assert_eq!(config.forced_enablement("Editor"), Some(true));
    assert_eq!(config.forced_enablement("Other"), Some(false));

    // Naming a plugin in both lists keeps it out
    config.no_load = vec!["Editor".to_string()];
    assert_eq!(config.forced_enablement("Editor"), Some(false));
}

#[test]
fn test_lookups() {
    let config = sample_config();
    assert!(config.is_ignored("Welcome"));
    assert!(!config.is_ignored("Lab"));
    assert!(config.is_force_enabled_in_settings("Lab"));
    assert!(config.is_under_test("Editor"));
    assert!(!config.is_under_test("Lab"));
    assert_eq!(config.arguments_for("Editor"), vec!["-theme", "dark"]);
    assert!(config.arguments_for("Lab").is_empty());

    let mut everything = EngineConfig::new();
    everything.test_plugins = vec!["all".to_string()];
    assert!(everything.is_under_test("Anything"));
}

#[test]
fn test_apply_to_manager() {
    let log = new_log();
    let mut manager = PluginManager::new();
    add_mock(&mut manager, PluginMetadata::new("Editor", "1.0"), &log);
    add_mock(&mut manager, PluginMetadata::new("Lab", "1.0").experimental(true), &log);
    assert!(manager.plugin("Editor").unwrap().is_effectively_enabled());
    assert!(!manager.plugin("Lab").unwrap().is_effectively_enabled());

    let mut config = EngineConfig::new();
    config.no_load = vec!["Editor".to_string()];
    config.load = vec!["Lab".to_string()];
    config.arguments.insert("Lab".to_string(), vec!["-v".to_string()]);
    config.apply_to(&mut manager);

    assert_eq!(manager.config(), &config);
    let editor = manager.plugin("Editor").unwrap();
    assert!(editor.is_force_disabled());
    assert!(!editor.is_effectively_enabled());
    let lab = manager.plugin("Lab").unwrap();
    assert!(lab.is_force_enabled());
    assert!(lab.is_effectively_enabled());
    assert_eq!(lab.arguments(), &["-v"]);
}

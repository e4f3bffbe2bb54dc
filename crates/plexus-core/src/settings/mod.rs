//! # Plexus Settings
//!
//! Engine configuration: which plugins are enabled, per-plugin arguments,
//! plugins under test and lifecycle timings.
//!
//! An [`EngineConfig`] is plain serde data. It can be stored as JSON, or as
//! YAML and TOML with the `yaml-config` and `toml-config` features; the format
//! follows the file extension. [`EngineConfig::apply_to`] hands it to a
//! [`PluginManager`], and [`PluginManager::write_settings`] produces the
//! [`PluginSettings`] to persist after the user changed enablement.

pub mod error;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::kernel::constants::DELAYED_INITIALIZE_INTERVAL_MS;
use crate::plugin_system::PluginManager;

pub use error::SettingsError;

/// Keyword matching every plugin in `load`, `no_load` and `test_plugins`
pub const ALL_PLUGINS: &str = "all";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Persistent enablement choices, relative to each plugin's default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Enabled by default, disabled by the user
    pub ignored: Vec<String>,
    /// Disabled by default, enabled by the user
    pub force_enabled: Vec<String>,
}

/// Configuration consumed by the [`PluginManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub plugins: PluginSettings,

    /// Plugins to load regardless of settings
    pub load: Vec<String>,

    /// Plugins to keep out of this run regardless of settings
    pub no_load: Vec<String>,

    /// Arguments passed to `initialize`, per plugin name
    pub arguments: BTreeMap<String, Vec<String>>,

    /// Plugins whose test dependencies and test objects are wanted
    pub test_plugins: Vec<String>,

    /// Platform name matched against platform specifications; defaults to the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Upper bound for waiting on asynchronous shutdowns; unbounded when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_ms: Option<u64>,

    pub delayed_initialize_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plugins: PluginSettings::default(),
            load: Vec::new(),
            no_load: Vec::new(),
            arguments: BTreeMap::new(),
            test_plugins: Vec::new(),
            platform: None,
            shutdown_timeout_ms: None,
            delayed_initialize_interval_ms: DELAYED_INITIALIZE_INTERVAL_MS,
        }
    }
}

fn lists(names: &[String], plugin: &str) -> bool {
    names.iter().any(|n| n == plugin || n.eq_ignore_ascii_case(ALL_PLUGINS))
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ignored(&self, plugin: &str) -> bool {
        self.plugins.ignored.iter().any(|n| n == plugin)
    }

    pub fn is_force_enabled_in_settings(&self, plugin: &str) -> bool {
        self.plugins.force_enabled.iter().any(|n| n == plugin)
    }

    /// `Some(true)` when the plugin is loaded regardless of settings, `Some(false)`
    /// when it is kept out. Naming a plugin beats the `all` keyword; otherwise
    /// `no_load` beats `load`.
    pub fn forced_enablement(&self, plugin: &str) -> Option<bool> {
        let named = |names: &[String]| names.iter().any(|n| n == plugin);
        let all = |names: &[String]| names.iter().any(|n| n.eq_ignore_ascii_case(ALL_PLUGINS));
        if named(&self.no_load) {
            Some(false)
        } else if named(&self.load) {
            Some(true)
        } else if all(&self.no_load) {
            Some(false)
        } else if all(&self.load) {
            Some(true)
        } else {
            None
        }
    }

    pub fn is_under_test(&self, plugin: &str) -> bool {
        lists(&self.test_plugins, plugin)
    }

    pub fn arguments_for(&self, plugin: &str) -> Vec<String> {
        self.arguments.get(plugin).cloned().unwrap_or_default()
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String, SettingsError> {
        let failed = |e: &dyn std::fmt::Display| SettingsError::Serialization {
            format: format.extension().to_string(),
            message: e.to_string(),
        };
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| failed(&e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| failed(&e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| failed(&e)),
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self, SettingsError> {
        let failed = |e: &dyn std::fmt::Display| SettingsError::Deserialization {
            format: format.extension().to_string(),
            message: e.to_string(),
        };
        match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| failed(&e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| failed(&e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| failed(&e)),
        }
    }

    fn format_of(path: &Path) -> Result<ConfigFormat, SettingsError> {
        ConfigFormat::from_path(path).ok_or_else(|| SettingsError::UnsupportedFormat(path.display().to_string()))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        let format = Self::format_of(path)?;
        let data = fs::read_to_string(path).map_err(|e| SettingsError::io(e, "read", path.to_path_buf()))?;
        let config = Self::deserialize(&data, format)?;
        log::debug!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration, creating parent directories as needed.
    pub fn save_to_path(&self, path: &Path) -> Result<(), SettingsError> {
        let format = Self::format_of(path)?;
        let data = self.serialize(format)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SettingsError::io(e, "create_dir_all", parent.to_path_buf()))?;
            }
        }
        fs::write(path, data).map_err(|e| SettingsError::io(e, "write", path.to_path_buf()))?;
        log::debug!("Saved engine configuration to {}", path.display());
        Ok(())
    }

    /// Makes this the manager's configuration and re-applies it to every
    /// registered plugin.
    pub fn apply_to(&self, manager: &mut PluginManager) {
        manager.set_config(self.clone());
    }
}

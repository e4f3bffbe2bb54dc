use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::platform::PlatformSpec;
use crate::plugin_system::traits::{Plugin, PluginFactory};
use crate::plugin_system::version::{PluginVersion, VersionConstraint};

/// Lifecycle stage of a plugin. Plugins only ever move to the next stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PluginState {
    /// Metadata could not be validated
    Invalid,
    /// Metadata validated
    Read,
    /// Dependencies matched to providers
    Resolved,
    /// Instance created
    Loaded,
    /// `initialize` succeeded
    Initialized,
    /// `extensions_initialized` called
    Running,
    /// `about_to_shutdown` called
    Stopped,
    /// Instance dropped
    Deleted,
}

impl PluginState {
    pub const ALL: [PluginState; 8] = [
        PluginState::Invalid,
        PluginState::Read,
        PluginState::Resolved,
        PluginState::Loaded,
        PluginState::Initialized,
        PluginState::Running,
        PluginState::Stopped,
        PluginState::Deleted,
    ];

    pub fn next(self) -> Option<PluginState> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    pub fn previous(self) -> Option<PluginState> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        index.checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginState::Invalid => "Invalid",
            PluginState::Read => "Read",
            PluginState::Resolved => "Resolved",
            PluginState::Loaded => "Loaded",
            PluginState::Initialized => "Initialized",
            PluginState::Running => "Running",
            PluginState::Stopped => "Stopped",
            PluginState::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

fn default_true() -> bool {
    true
}

/// Parsed plugin metadata, as handed to the engine by whoever read the plugin's
/// metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,

    pub version: String,

    /// Oldest version this plugin is backwards compatible with; defaults to `version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compat_version: Option<String>,

    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub category: String,

    /// Regular expression matched against the host platform name; empty means all
    #[serde(default)]
    pub platform: String,

    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,

    /// Required plugins are always loaded and cannot be disabled
    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub hidden_by_default: bool,

    /// Experimental plugins are disabled by default
    #[serde(default)]
    pub experimental: bool,

    #[serde(default = "default_true")]
    pub enabled_by_default: bool,
}

impl PluginMetadata {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            compat_version: None,
            vendor: String::new(),
            copyright: String::new(),
            license: String::new(),
            description: String::new(),
            url: String::new(),
            category: String::new(),
            platform: String::new(),
            dependencies: Vec::new(),
            required: false,
            hidden_by_default: false,
            experimental: false,
            enabled_by_default: true,
        }
    }

    pub fn with_compat_version(mut self, compat_version: &str) -> Self {
        self.compat_version = Some(compat_version.to_string());
        self
    }

    pub fn with_dependency(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn experimental(mut self, experimental: bool) -> Self {
        self.experimental = experimental;
        self
    }

    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = enabled;
        self
    }

    pub fn hidden_by_default(mut self, hidden: bool) -> Self {
        self.hidden_by_default = hidden;
        self
    }
}

/// Everything the engine knows about one plugin: metadata, enablement flags,
/// lifecycle state, last error and, once loaded, the instance.
///
/// Specs are created and mutated only by the
/// [`PluginManager`](crate::plugin_system::PluginManager); outside code gets
/// shared references.
pub struct PluginSpec {
    metadata: PluginMetadata,
    version: PluginVersion,
    compat_version: PluginVersion,
    platform: PlatformSpec,
    arguments: Vec<String>,

    enabled_by_settings: bool,
    force_enabled: bool,
    force_disabled: bool,
    enabled_indirectly: bool,
    disabled_indirectly: bool,
    available_for_host_platform: bool,

    state: PluginState,
    error: Option<String>,

    factory: PluginFactory,
    instance: Option<Arc<dyn Plugin>>,
}

impl PluginSpec {
    /// Validates `metadata`. The result is in `Read`, or in `Invalid` with the
    /// reason recorded as its error.
    pub(crate) fn read(metadata: PluginMetadata, factory: PluginFactory, host_platform: &str) -> Self {
        let mut spec = Self {
            metadata,
            version: PluginVersion::default(),
            compat_version: PluginVersion::default(),
            platform: PlatformSpec::any(),
            arguments: Vec::new(),
            enabled_by_settings: false,
            force_enabled: false,
            force_disabled: false,
            enabled_indirectly: false,
            disabled_indirectly: false,
            available_for_host_platform: true,
            state: PluginState::Invalid,
            error: None,
            factory,
            instance: None,
        };

        spec.enabled_by_settings = spec.is_enabled_by_default();
        match spec.validate() {
            Ok(()) => {
                spec.available_for_host_platform = spec.platform.matches(host_platform);
                spec.state = PluginState::Read;
            }
            Err(message) => {
                log::warn!("Plugin '{}' has invalid metadata: {}", spec.name(), message);
                spec.error = Some(message);
            }
        }
        spec
    }

    fn validate(&mut self) -> Result<(), String> {
        let name = self.metadata.name.clone();
        if name.trim().is_empty() {
            return Err("Plugin name is empty".to_string());
        }
        self.version = PluginVersion::parse(&self.metadata.version)
            .map_err(|_| format!("Invalid version '{}'", self.metadata.version))?;
        self.compat_version = match &self.metadata.compat_version {
            Some(compat) if !compat.trim().is_empty() => {
                PluginVersion::parse(compat).map_err(|_| format!("Invalid compatibility version '{}'", compat))?
            }
            _ => self.version,
        };
        if self.compat_version > self.version {
            return Err(format!(
                "Compatibility version {} is newer than version {}",
                self.compat_version, self.version
            ));
        }
        for dependency in &self.metadata.dependencies {
            dependency.validate().map_err(|e| e.to_string())?;
        }
        self.platform = PlatformSpec::parse(&name, &self.metadata.platform).map_err(|e| match e {
            PluginSystemError::MetadataError { message, .. } => message,
            other => other.to_string(),
        })?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> PluginVersion {
        self.version
    }

    pub fn compat_version(&self) -> PluginVersion {
        self.compat_version
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub fn vendor(&self) -> &str {
        &self.metadata.vendor
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    pub fn category(&self) -> &str {
        &self.metadata.category
    }

    pub fn platform(&self) -> &PlatformSpec {
        &self.platform
    }

    pub fn dependencies(&self) -> &[PluginDependency] {
        &self.metadata.dependencies
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_required(&self) -> bool {
        self.metadata.required
    }

    pub fn is_experimental(&self) -> bool {
        self.metadata.experimental
    }

    pub fn is_hidden_by_default(&self) -> bool {
        self.metadata.hidden_by_default
    }

    /// Experimental plugins start disabled; required plugins always start enabled.
    pub fn is_enabled_by_default(&self) -> bool {
        (self.metadata.enabled_by_default && !self.metadata.experimental) || self.metadata.required
    }

    pub fn is_enabled_by_settings(&self) -> bool {
        self.enabled_by_settings
    }

    pub fn is_force_enabled(&self) -> bool {
        self.force_enabled
    }

    pub fn is_force_disabled(&self) -> bool {
        self.force_disabled
    }

    pub fn is_enabled_indirectly(&self) -> bool {
        self.enabled_indirectly
    }

    pub fn is_disabled_indirectly(&self) -> bool {
        self.disabled_indirectly
    }

    pub fn is_available_for_host_platform(&self) -> bool {
        self.available_for_host_platform
    }

    /// Whether the plugin takes part in the next load run.
    pub fn is_effectively_enabled(&self) -> bool {
        if !self.available_for_host_platform {
            return false;
        }
        if self.force_enabled || self.enabled_indirectly {
            return true;
        }
        if self.force_disabled {
            return false;
        }
        self.enabled_by_settings
    }

    /// Whether this plugin satisfies a dependency on `name` with `constraint`.
    /// Names compare case-insensitively.
    pub fn provides(&self, name: &str, constraint: &str) -> bool {
        if !self.metadata.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match VersionConstraint::parse(constraint) {
            Ok(constraint) => constraint.is_satisfied_by(&self.version, &self.compat_version),
            Err(_) => false,
        }
    }

    /// The live plugin instance, present from `Loaded` until deletion
    pub fn instance(&self) -> Option<Arc<dyn Plugin>> {
        self.instance.clone()
    }

    /// Public view for display or serialization
    pub fn status(&self) -> PluginStatus {
        PluginStatus {
            name: self.metadata.name.clone(),
            version: self.version.to_string(),
            category: self.metadata.category.clone(),
            state: self.state,
            required: self.metadata.required,
            experimental: self.metadata.experimental,
            effectively_enabled: self.is_effectively_enabled(),
            enabled_indirectly: self.enabled_indirectly,
            disabled_indirectly: self.disabled_indirectly,
            available_for_host_platform: self.available_for_host_platform,
            error: self.error.clone(),
        }
    }

    pub(crate) fn set_state(&mut self, next: PluginState) -> Result<(), PluginSystemError> {
        if self.state.next() != Some(next) {
            return Err(PluginSystemError::InvalidStateTransition {
                plugin_id: self.metadata.name.clone(),
                from: self.state,
                to: next,
            });
        }
        log::debug!("Plugin '{}': {} -> {}", self.metadata.name, self.state, next);
        self.state = next;
        Ok(())
    }

    pub(crate) fn set_error(&mut self, message: String) {
        log::error!("Plugin '{}': {}", self.metadata.name, message);
        self.error = Some(message);
    }

    pub(crate) fn set_enabled_by_settings(&mut self, enabled: bool) {
        self.enabled_by_settings = enabled;
    }

    pub(crate) fn set_force_enabled(&mut self, value: bool) {
        self.force_enabled = value;
        if value {
            self.force_disabled = false;
        }
    }

    pub(crate) fn set_force_disabled(&mut self, value: bool) {
        self.force_disabled = value;
        if value {
            self.force_enabled = false;
        }
    }

    pub(crate) fn set_enabled_indirectly(&mut self, value: bool) {
        self.enabled_indirectly = value;
    }

    pub(crate) fn set_disabled_indirectly(&mut self, value: bool) {
        self.disabled_indirectly = value;
    }

    pub(crate) fn set_arguments(&mut self, arguments: Vec<String>) {
        self.arguments = arguments;
    }

    pub(crate) fn update_host_platform(&mut self, host_platform: &str) {
        self.available_for_host_platform = self.platform.matches(host_platform);
    }

    pub(crate) fn factory(&self) -> &PluginFactory {
        &self.factory
    }

    pub(crate) fn set_instance(&mut self, instance: Arc<dyn Plugin>) {
        self.instance = Some(instance);
    }

    pub(crate) fn take_instance(&mut self) -> Option<Arc<dyn Plugin>> {
        self.instance.take()
    }
}

impl fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSpec")
            .field("name", &self.metadata.name)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("error", &self.error)
            .field("effectively_enabled", &self.is_effectively_enabled())
            .finish()
    }
}

/// Serializable snapshot of a [`PluginSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStatus {
    pub name: String,
    pub version: String,
    pub category: String,
    pub state: PluginState,
    pub required: bool,
    pub experimental: bool,
    pub effectively_enabled: bool,
    pub enabled_indirectly: bool,
    pub disabled_indirectly: bool,
    pub available_for_host_platform: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

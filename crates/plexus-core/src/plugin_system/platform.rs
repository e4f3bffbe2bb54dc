use regex::Regex;

use crate::plugin_system::error::PluginSystemError;

/// Regular expression a host platform name must match for a plugin to be available.
///
/// An empty specification matches every platform.
#[derive(Debug, Clone, Default)]
pub struct PlatformSpec {
    pattern: Option<Regex>,
}

impl PlatformSpec {
    /// Compiles `pattern`; `plugin` is only used for the error message.
    pub fn parse(plugin: &str, pattern: &str) -> Result<Self, PluginSystemError> {
        if pattern.trim().is_empty() {
            return Ok(Self::any());
        }
        let regex = Regex::new(pattern).map_err(|e| PluginSystemError::MetadataError {
            plugin_id: plugin.to_string(),
            message: format!("Invalid platform specification '{}': {}", pattern, e),
        })?;
        Ok(Self { pattern: Some(regex) })
    }

    pub fn any() -> Self {
        Self { pattern: None }
    }

    /// The original pattern, empty for "any platform"
    pub fn as_str(&self) -> &str {
        self.pattern.as_ref().map(|r| r.as_str()).unwrap_or("")
    }

    pub fn matches(&self, platform_name: &str) -> bool {
        match &self.pattern {
            Some(regex) => regex.is_match(platform_name),
            None => true,
        }
    }
}

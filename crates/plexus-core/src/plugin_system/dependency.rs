use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plugin_system::version::{VersionConstraint, VersionError};

/// How strongly a plugin needs one of its dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Loading fails when the dependency is missing or fails
    #[default]
    Required,
    /// Used when present, silently skipped otherwise
    Optional,
    /// Only loaded when the dependant plugin is under test
    Test,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Required => write!(f, "required"),
            DependencyKind::Optional => write!(f, "optional"),
            DependencyKind::Test => write!(f, "test"),
        }
    }
}

/// Represents a dependency on another plugin.
///
/// Equality and hashing are structural over name, version and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginDependency {
    /// The name of the required plugin
    pub name: String,

    /// Version constraint string; empty means any version
    #[serde(default)]
    pub version: String,

    /// Whether this is a hard requirement, optional, or test-only dependency
    #[serde(default, rename = "type")]
    pub kind: DependencyKind,
}

/// Error that can occur when resolving dependencies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// The required plugin was not found
    #[error("Could not resolve dependency '{name}({version})'")]
    MissingPlugin { name: String, version: String },

    /// More than one plugin satisfies the declaration
    #[error("Ambiguous dependency '{name}({version})': provided by {}", .candidates.join(", "))]
    Ambiguous {
        name: String,
        version: String,
        candidates: Vec<String>,
    },

    /// Dependency cycle detected
    #[error("Circular dependency detected: {}", .0.join(" depends on "))]
    CyclicDependency(Vec<String>),

    /// The declaration itself is malformed
    #[error("Invalid dependency declaration '{name}': {reason}")]
    InvalidDeclaration { name: String, reason: String },
}

impl PluginDependency {
    /// Create a new dependency of the given kind
    pub fn new(name: &str, version: &str, kind: DependencyKind) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            kind,
        }
    }

    /// Create a new required dependency with a version constraint
    pub fn required(name: &str, version: &str) -> Self {
        Self::new(name, version, DependencyKind::Required)
    }

    /// Create a new required dependency with any version
    pub fn required_any(name: &str) -> Self {
        Self::new(name, "", DependencyKind::Required)
    }

    /// Create a new optional dependency with a version constraint
    pub fn optional(name: &str, version: &str) -> Self {
        Self::new(name, version, DependencyKind::Optional)
    }

    /// Create a new optional dependency with any version
    pub fn optional_any(name: &str) -> Self {
        Self::new(name, "", DependencyKind::Optional)
    }

    /// Create a new test-only dependency
    pub fn test(name: &str, version: &str) -> Self {
        Self::new(name, version, DependencyKind::Test)
    }

    pub fn is_required(&self) -> bool {
        self.kind == DependencyKind::Required
    }

    /// Parses the version constraint string
    pub fn constraint(&self) -> Result<VersionConstraint, VersionError> {
        VersionConstraint::parse(&self.version)
    }

    /// Checks the declaration is usable: a non-empty name and a parseable constraint.
    pub fn validate(&self) -> Result<(), DependencyError> {
        if self.name.trim().is_empty() {
            return Err(DependencyError::InvalidDeclaration {
                name: self.name.clone(),
                reason: "dependency name is empty".to_string(),
            });
        }
        self.constraint().map(|_| ()).map_err(|e| DependencyError::InvalidDeclaration {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirement_type = match self.kind {
            DependencyKind::Required => "Requires",
            DependencyKind::Optional => "Optional",
            DependencyKind::Test => "Test",
        };
        if self.version.is_empty() {
            write!(f, "{} plugin: {} (any version)", requirement_type, self.name)
        } else {
            write!(f, "{} plugin: {} (version: {})", requirement_type, self.name, self.version)
        }
    }
}

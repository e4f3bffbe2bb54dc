use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use thiserror::Error;

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version format: '{0}'")]
    InvalidFormat(String),
    #[error("Version parse error: {0}")]
    ParseError(String),
}

/// A plugin version of the form `major[.minor[.patch]][_build]`.
///
/// Missing components compare as zero, so `1.2` equals `1.2.0_0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl PluginVersion {
    /// Creates a new plugin version
    pub fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self { major, minor, patch, build }
    }

    /// Parses a version string like "1", "1.2", "1.2.3" or "1.2.3_4"
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat(version.to_string());

        let (dotted, build) = match version.split_once('_') {
            Some((dotted, build)) => (dotted, Some(build)),
            None => (version, None),
        };

        let parse_part = |part: &str| -> Result<u32, VersionError> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u32>().map_err(|e| VersionError::ParseError(format!("'{}': {}", version, e)))
        };

        let parts: Vec<&str> = dotted.split('.').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
            *slot = parse_part(part)?;
        }
        let build = match build {
            Some(b) => parse_part(b)?,
            None => 0,
        };

        Ok(Self::new(numbers[0], numbers[1], numbers[2], build))
    }

    /// Whether `version` is a well-formed plugin version string
    pub fn is_valid(version: &str) -> bool {
        Self::parse(version).is_ok()
    }

    /// Lossy conversion for matching against semver range expressions; the build number is dropped.
    pub fn to_semver(&self) -> Version {
        Version::new(self.major as u64, self.minor as u64, self.patch as u64)
    }
}

impl FromStr for PluginVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginVersion::parse(s)
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.build != 0 {
            write!(f, "_{}", self.build)?;
        }
        Ok(())
    }
}

/// Compares two version strings; unparsable strings compare equal to anything.
pub fn version_compare(lhs: &str, rhs: &str) -> Ordering {
    match (PluginVersion::parse(lhs), PluginVersion::parse(rhs)) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => Ordering::Equal,
    }
}

/// Represents a version requirement range using semver constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    /// The original constraint string (e.g., "^1.2.3", ">=2.0")
    constraint: String,
    /// The parsed semver requirement
    req: VersionReq,
}

impl VersionRange {
    /// Creates a new version range from a constraint string.
    pub fn from_constraint(constraint: &str) -> Result<Self, VersionError> {
        let req = VersionReq::parse(constraint)
            .map_err(|e| VersionError::ParseError(format!("Invalid version constraint '{}': {}", constraint, e)))?;
        Ok(Self {
            constraint: constraint.to_string(),
            req,
        })
    }

    /// Checks if a specific `semver::Version` satisfies this range.
    pub fn includes(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    /// Returns a reference to the underlying `semver::VersionReq`.
    pub fn semver_req(&self) -> &VersionReq {
        &self.req
    }

    /// Returns the original constraint string.
    pub fn constraint_string(&self) -> &str {
        &self.constraint
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constraint)
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::from_constraint(s)
    }
}

/// What a dependency declaration asks of its provider's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Empty constraint: any version will do.
    Any,
    /// A plain version `V`, satisfied by providers with `compat_version <= V <= version`.
    Compatible(PluginVersion),
    /// A semver range expression matched against the provider's version.
    Range(VersionRange),
}

impl VersionConstraint {
    /// Parses a constraint. Plain versions win over range expressions, so "1.2" is
    /// a compatibility request rather than the semver shorthand `^1.2`.
    pub fn parse(constraint: &str) -> Result<Self, VersionError> {
        let trimmed = constraint.trim();
        if trimmed.is_empty() {
            return Ok(VersionConstraint::Any);
        }
        if let Ok(version) = PluginVersion::parse(trimmed) {
            return Ok(VersionConstraint::Compatible(version));
        }
        VersionRange::from_constraint(trimmed).map(VersionConstraint::Range)
    }

    /// Checks a provider described by its `(version, compat_version)` pair.
    pub fn is_satisfied_by(&self, version: &PluginVersion, compat_version: &PluginVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Compatible(requested) => compat_version <= requested && requested <= version,
            VersionConstraint::Range(range) => range.includes(&version.to_semver()),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Compatible(v) => write!(f, "{}", v),
            VersionConstraint::Range(r) => write!(f, "{}", r),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

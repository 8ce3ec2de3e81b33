//! API version triples
//!
//! Versions appear in three spellings across the inputs: dotted strings in
//! declaration files (`"1.0.0"`, `"1.1"`), feature names in the registry
//! (`VK_VERSION_1_1`) and `number` attributes (`"1.1"`). All of them parse
//! into [`ApiVersion`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix of registry feature names (`VK_VERSION_1_2`)
pub const FEATURE_PREFIX: &str = "VK_VERSION_";

/// A `(major, minor, patch)` API version, ordered lexicographically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Error returned when a version string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid API version: {0:?}")]
pub struct VersionParseError(pub String);

impl ApiVersion {
    /// The first API version; used as the core floor when the registry
    /// states none.
    pub const FLOOR: ApiVersion = ApiVersion::new(1, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a registry feature name such as `VK_VERSION_1_1`
    pub fn from_feature_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(FEATURE_PREFIX)?;
        let (major, minor) = rest.split_once('_')?;
        Some(Self::new(major.parse().ok()?, minor.parse().ok()?, 0))
    }

    /// Whether `name` is spelled like a feature name rather than an extension
    pub fn is_feature_name(name: &str) -> bool {
        Self::from_feature_name(name).is_some()
    }

    /// Feature name used for version entries in the table (`VK_VERSION_1_0`)
    pub fn feature_name(&self) -> String {
        format!("{}{}_{}", FEATURE_PREFIX, self.major, self.minor)
    }

    /// C expression producing the packed version number
    pub fn c_literal(&self) -> String {
        format!("VK_MAKE_VERSION({}, {}, {})", self.major, self.minor, self.patch)
    }

    /// Compare major and minor only
    pub fn same_minor(&self, other: &ApiVersion) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::FLOOR
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ApiVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(version) = Self::from_feature_name(trimmed) {
            return Ok(version);
        }

        let err = || VersionParseError(s.to_string());
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(err());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| err())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}

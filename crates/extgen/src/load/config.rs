//! Driver declaration files
//!
//! A declaration file is TOML holding the driver prefix, version policy,
//! suppression settings and the ordered extension list:
//!
//! ```toml
//! driver = "panvk"
//! max_api_version = "1.0.0"
//! os_owned_presentation = false
//!
//! [[extension]]
//! name = "VK_KHR_surface"
//! spec_version = 25
//! enable = "PANVK_HAS_SURFACE"
//! ```

use crate::ir::{ApiVersion, DeclaredExtension, DriverDeclaration, PromotedVersion, VersionPolicy};
use crate::resolve::{DependencyPolicy, PlatformSuppression};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading a declaration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema error
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Version string that does not parse
    #[error("invalid API version {value:?}: {message}")]
    InvalidVersion { value: String, message: String },

    /// Driver prefix, feature flag or synthetic name that is not a C identifier
    #[error("{what} {value:?} is not a valid C identifier")]
    InvalidIdentifier { what: &'static str, value: String },
}

fn default_driver() -> String {
    "drv".to_string()
}

/// Parsed declaration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarationFile {
    /// C identifier prefix for generated symbols
    #[serde(default = "default_driver")]
    pub driver: String,
    pub max_api_version: ApiVersion,
    /// Explicit platform tags to suppress
    #[serde(default)]
    pub suppress_platforms: Vec<String>,
    /// Suppress every presentation extension
    #[serde(default)]
    pub os_owned_presentation: bool,
    #[serde(default)]
    pub dependencies: DependencyPolicy,
    /// Promoted versions; defaults to just `max_api_version`
    #[serde(default, rename = "api_version")]
    pub api_versions: Vec<PromotedVersion>,
    #[serde(default, rename = "extension")]
    pub extensions: Vec<DeclaredExtension>,
}

impl DeclarationFile {
    /// Read and validate a declaration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse and validate declaration text; `origin` is only used in errors
    pub fn parse(text: &str, origin: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file: DeclarationFile = toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: origin.as_ref().to_path_buf(),
            source,
        })?;
        file.validate()?;
        debug!(
            driver = %file.driver,
            extensions = file.extensions.len(),
            max_api_version = %file.max_api_version,
            "extgen.declaration.loaded"
        );
        Ok(file)
    }

    /// Check that every name that ends up in C source is an identifier
    ///
    /// Registry extension names are checked against the registry during
    /// resolution. Synthetic names never are, so they must look like one:
    /// `VK_` followed by the rest of a C identifier, which also keeps their
    /// table fields distinct from registry ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_c_identifier(&self.driver) {
            return Err(ConfigError::InvalidIdentifier {
                what: "driver prefix",
                value: self.driver.clone(),
            });
        }

        for entry in self.extensions.iter().filter(|e| e.synthetic) {
            let valid = entry
                .name
                .strip_prefix("VK_")
                .is_some_and(|rest| !rest.is_empty() && is_c_identifier(&entry.name));
            if !valid {
                return Err(ConfigError::InvalidIdentifier {
                    what: "synthetic extension name",
                    value: entry.name.clone(),
                });
            }
        }

        let flags = self
            .extensions
            .iter()
            .map(|e| &e.enable_condition)
            .chain(self.api_versions.iter().map(|v| &v.enable_condition))
            .filter_map(|c| c.flag_name());
        for flag in flags {
            if !is_c_identifier(flag) {
                return Err(ConfigError::InvalidIdentifier {
                    what: "feature flag",
                    value: flag.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Replace the maximum API version, e.g. from the command line
    pub fn override_max_api_version(&mut self, value: &str) -> Result<(), ConfigError> {
        self.max_api_version = value.parse().map_err(|e: crate::ir::VersionParseError| {
            ConfigError::InvalidVersion {
                value: value.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// Replace the driver prefix
    pub fn override_driver(&mut self, prefix: &str) -> Result<(), ConfigError> {
        if !is_c_identifier(prefix) {
            return Err(ConfigError::InvalidIdentifier {
                what: "driver prefix",
                value: prefix.to_string(),
            });
        }
        self.driver = prefix.to_string();
        Ok(())
    }

    /// Extension entries in file order
    pub fn declaration(&self) -> DriverDeclaration {
        self.extensions.iter().cloned().collect()
    }

    pub fn version_policy(&self) -> VersionPolicy {
        if self.api_versions.is_empty() {
            return VersionPolicy::up_to(self.max_api_version);
        }
        VersionPolicy {
            max_api_version: self.max_api_version,
            promoted_versions: self.api_versions.clone(),
        }
    }

    pub fn suppression(&self) -> PlatformSuppression {
        let base = if self.os_owned_presentation {
            PlatformSuppression::os_owned_presentation()
        } else {
            PlatformSuppression::new()
        };
        self.suppress_platforms
            .iter()
            .fold(base, |policy, tag| policy.tag(tag.as_str()))
    }

    pub fn dependency_policy(&self) -> DependencyPolicy {
        self.dependencies
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

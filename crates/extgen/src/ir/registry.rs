//! Specification registry
//!
//! Read-only view of every extension and API version the vendor
//! specification knows about. The resolver only asks three questions of it:
//! the record for a name, that record's latest spec version, and its
//! required core version.

use crate::ir::{ApiVersion, DependencyExpr};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;

/// Which dispatchable object an extension hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Instance,
    #[default]
    Device,
}

impl ExtensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionKind::Instance => "instance",
            ExtensionKind::Device => "device",
        }
    }
}

impl std::str::FromStr for ExtensionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance" => Ok(ExtensionKind::Instance),
            "device" => Ok(ExtensionKind::Device),
            other => Err(format!("unknown extension type: {}", other)),
        }
    }
}

/// One extension as described by the specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// Extension name (e.g., "VK_KHR_surface")
    pub name: String,
    /// Registry extension number
    pub numeric_id: u32,
    /// Instance or device extension
    pub kind: ExtensionKind,
    /// Latest revision of the extension
    pub spec_version: u32,
    /// Minimum API version the extension assumes
    pub required_core_version: ApiVersion,
    /// Platform the extension is bound to (e.g., "wayland", "android")
    pub platform_tag: Option<String>,
    /// Surface, swapchain or display extension
    #[serde(default)]
    pub presentation: bool,
    /// Other extensions or versions this one needs
    pub depends: Option<DependencyExpr>,
    /// Core version the extension was promoted into
    pub promoted_to: Option<ApiVersion>,
}

impl ExtensionRecord {
    /// Create a device extension record at the floor version
    pub fn new(name: impl Into<String>, numeric_id: u32, spec_version: u32) -> Self {
        Self {
            name: name.into(),
            numeric_id,
            kind: ExtensionKind::Device,
            spec_version,
            required_core_version: ApiVersion::FLOOR,
            platform_tag: None,
            presentation: false,
            depends: None,
            promoted_to: None,
        }
    }

    /// Set the extension kind
    pub fn with_kind(mut self, kind: ExtensionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark as an instance extension
    pub fn instance(self) -> Self {
        self.with_kind(ExtensionKind::Instance)
    }

    /// Set the required core version
    pub fn requires_core(mut self, version: ApiVersion) -> Self {
        self.required_core_version = version;
        self
    }

    /// Set the platform tag
    pub fn with_platform(mut self, tag: impl Into<String>) -> Self {
        self.platform_tag = Some(tag.into());
        self
    }

    /// Mark as a window-system integration extension
    pub fn presentation(mut self) -> Self {
        self.presentation = true;
        self
    }

    /// Set the dependency expression
    pub fn with_depends(mut self, depends: DependencyExpr) -> Self {
        self.depends = Some(depends);
        self
    }

    /// Set the promotion target
    pub fn promoted_to(mut self, version: ApiVersion) -> Self {
        self.promoted_to = Some(version);
        self
    }
}

/// Errors raised while assembling a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed XML
    #[error("XML error in {path}: {message}")]
    Xml { path: PathBuf, message: String },

    /// Required attribute missing on an element
    #[error("<{element}> is missing attribute '{attribute}'{}", context_suffix(.context))]
    MissingAttribute {
        element: String,
        attribute: String,
        context: Option<String>,
    },

    /// Attribute present but unparsable
    #[error("invalid value {value:?} for '{attribute}' on {element}: {message}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
        message: String,
    },

    /// Two records share a name
    #[error("duplicate extension in registry: {0}")]
    DuplicateExtension(String),

    /// Two records share a numeric id
    #[error("duplicate extension number {number}: {first} and {second}")]
    DuplicateNumber {
        number: u32,
        first: String,
        second: String,
    },
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_ref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

/// Queryable set of extension records, API versions and platform guards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecRegistry {
    extensions: IndexMap<String, ExtensionRecord>,
    versions: BTreeSet<ApiVersion>,
    platforms: BTreeMap<String, String>,
    numbers: HashMap<u32, String>,
}

impl SpecRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, rejecting duplicate names and numeric ids
    pub fn insert(&mut self, record: ExtensionRecord) -> Result<(), RegistryError> {
        if self.extensions.contains_key(&record.name) {
            return Err(RegistryError::DuplicateExtension(record.name));
        }
        if let Some(first) = self.numbers.get(&record.numeric_id) {
            return Err(RegistryError::DuplicateNumber {
                number: record.numeric_id,
                first: first.clone(),
                second: record.name,
            });
        }

        self.numbers.insert(record.numeric_id, record.name.clone());
        self.extensions.insert(record.name.clone(), record);
        Ok(())
    }

    /// Builder-style insert for tests and hand-assembled registries
    pub fn with_extension(mut self, record: ExtensionRecord) -> Result<Self, RegistryError> {
        self.insert(record)?;
        Ok(self)
    }

    /// Record a known API version
    pub fn add_version(&mut self, version: ApiVersion) {
        self.versions.insert(version);
    }

    /// Builder-style version registration
    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.add_version(version);
        self
    }

    /// Record the guard macro protecting a platform
    pub fn add_platform(&mut self, name: impl Into<String>, protect: impl Into<String>) {
        self.platforms.insert(name.into(), protect.into());
    }

    /// Merge another registry into this one
    pub fn merge(&mut self, other: SpecRegistry) -> Result<(), RegistryError> {
        for (_, record) in other.extensions {
            self.insert(record)?;
        }
        self.versions.extend(other.versions);
        self.platforms.extend(other.platforms);
        Ok(())
    }

    /// Look up a record by name
    pub fn get(&self, name: &str) -> Option<&ExtensionRecord> {
        self.extensions.get(name)
    }

    /// Latest spec version known for `name`
    pub fn latest_spec_version(&self, name: &str) -> Option<u32> {
        self.get(name).map(|r| r.spec_version)
    }

    /// Required core version for `name`
    pub fn required_core_version(&self, name: &str) -> Option<ApiVersion> {
        self.get(name).map(|r| r.required_core_version)
    }

    /// Whether the registry defines this API version (major/minor match)
    pub fn knows_version(&self, version: &ApiVersion) -> bool {
        self.versions.iter().any(|v| v.same_minor(version))
    }

    /// All known API versions, ascending
    pub fn versions(&self) -> impl Iterator<Item = &ApiVersion> {
        self.versions.iter()
    }

    /// Guard macro for a platform (e.g., "wayland" -> "VK_USE_PLATFORM_WAYLAND_KHR")
    pub fn platform_guard(&self, platform: &str) -> Option<&str> {
        self.platforms.get(platform).map(String::as_str)
    }

    /// Whether `macro_name` is one of the platform guard macros
    pub fn is_platform_guard(&self, macro_name: &str) -> bool {
        self.platforms.values().any(|m| m == macro_name)
    }

    /// Every platform guard macro, in platform-name order
    pub fn platform_guards(&self) -> impl Iterator<Item = &str> {
        self.platforms.values().map(String::as_str)
    }

    /// All records in registry order
    pub fn extensions(&self) -> impl Iterator<Item = &ExtensionRecord> {
        self.extensions.values()
    }

    /// Number of extension records
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether the registry holds no extensions
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let registry = SpecRegistry::new()
            .with_extension(
                ExtensionRecord::new("VK_KHR_surface", 1, 25).instance(),
            )
            .unwrap()
            .with_extension(
                ExtensionRecord::new("VK_KHR_maintenance2", 118, 1)
                    .promoted_to(ApiVersion::new(1, 1, 0)),
            )
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.latest_spec_version("VK_KHR_surface"), Some(25));
        assert_eq!(
            registry.required_core_version("VK_KHR_surface"),
            Some(ApiVersion::FLOOR)
        );
        assert_eq!(registry.get("VK_KHR_surface").unwrap().kind, ExtensionKind::Instance);
        assert!(registry.get("VK_KHR_missing").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = SpecRegistry::new();
        registry.insert(ExtensionRecord::new("VK_EXT_a", 1, 1)).unwrap();
        let err = registry.insert(ExtensionRecord::new("VK_EXT_a", 2, 1)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateExtension(name) if name == "VK_EXT_a"));
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let mut registry = SpecRegistry::new();
        registry.insert(ExtensionRecord::new("VK_EXT_a", 7, 1)).unwrap();
        let err = registry.insert(ExtensionRecord::new("VK_EXT_b", 7, 1)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateNumber { number: 7, ref first, ref second }
                if first == "VK_EXT_a" && second == "VK_EXT_b"
        ));
    }

    #[test]
    fn test_versions_and_platforms() {
        let mut registry = SpecRegistry::new()
            .with_version(ApiVersion::new(1, 1, 0))
            .with_version(ApiVersion::new(1, 0, 0));
        registry.add_platform("wayland", "VK_USE_PLATFORM_WAYLAND_KHR");

        assert_eq!(registry.versions().next(), Some(&ApiVersion::new(1, 0, 0)));
        assert!(registry.knows_version(&ApiVersion::new(1, 1, 0)));
        assert!(registry.knows_version(&ApiVersion::new(1, 0, 3)));
        assert!(!registry.knows_version(&ApiVersion::new(1, 2, 0)));
        assert_eq!(
            registry.platform_guard("wayland"),
            Some("VK_USE_PLATFORM_WAYLAND_KHR")
        );
        assert!(registry.is_platform_guard("VK_USE_PLATFORM_WAYLAND_KHR"));
        assert!(!registry.is_platform_guard("PANVK_HAS_SURFACE"));
    }

    #[test]
    fn test_merge_detects_collisions() {
        let mut a = SpecRegistry::new()
            .with_extension(ExtensionRecord::new("VK_EXT_a", 1, 1))
            .unwrap();
        let b = SpecRegistry::new()
            .with_extension(ExtensionRecord::new("VK_ANDROID_native_buffer", 11, 8))
            .unwrap()
            .with_version(ApiVersion::new(1, 0, 0));
        a.merge(b).unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.knows_version(&ApiVersion::FLOOR));

        let c = SpecRegistry::new()
            .with_extension(ExtensionRecord::new("VK_EXT_c", 1, 1))
            .unwrap();
        assert!(a.merge(c).is_err());
    }
}

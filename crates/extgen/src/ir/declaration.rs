//! Driver-side declarations
//!
//! What the driver claims to implement: an ordered list of extensions with
//! the condition under which each is reported, and the API versions it
//! exposes. These are plain values; nothing here is evaluated until the
//! resolver runs.

use crate::ir::{ApiVersion, ExtensionKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition controlling whether a table entry reports itself as enabled
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub enum EnableCondition {
    /// Unconditionally enabled
    #[default]
    Always,
    /// Known to the driver but withheld
    Never,
    /// Enabled when the named compile-time macro evaluates true
    FeatureFlag(String),
}

/// On-disk spelling: `true`, `false` or `"MACRO_NAME"`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Bool(bool),
    Flag(String),
}

impl From<RawCondition> for EnableCondition {
    fn from(raw: RawCondition) -> Self {
        match raw {
            RawCondition::Bool(true) => EnableCondition::Always,
            RawCondition::Bool(false) => EnableCondition::Never,
            RawCondition::Flag(flag) => EnableCondition::FeatureFlag(flag),
        }
    }
}

impl From<EnableCondition> for RawCondition {
    fn from(condition: EnableCondition) -> Self {
        match condition {
            EnableCondition::Always => RawCondition::Bool(true),
            EnableCondition::Never => RawCondition::Bool(false),
            EnableCondition::FeatureFlag(flag) => RawCondition::Flag(flag),
        }
    }
}

impl EnableCondition {
    /// Shorthand for a feature-flag condition
    pub fn flag(name: impl Into<String>) -> Self {
        EnableCondition::FeatureFlag(name.into())
    }

    pub fn is_never(&self) -> bool {
        matches!(self, EnableCondition::Never)
    }

    /// The flag name, if this is a feature-flag condition
    pub fn flag_name(&self) -> Option<&str> {
        match self {
            EnableCondition::FeatureFlag(name) => Some(name),
            _ => None,
        }
    }

    /// C expression for this condition
    pub fn c_expr(&self) -> &str {
        match self {
            EnableCondition::Always => "true",
            EnableCondition::Never => "false",
            EnableCondition::FeatureFlag(name) => name,
        }
    }
}

impl From<bool> for EnableCondition {
    fn from(value: bool) -> Self {
        if value {
            EnableCondition::Always
        } else {
            EnableCondition::Never
        }
    }
}

impl From<&str> for EnableCondition {
    fn from(flag: &str) -> Self {
        EnableCondition::FeatureFlag(flag.to_string())
    }
}

impl fmt::Display for EnableCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_expr())
    }
}

/// One extension the driver chooses to expose or withhold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredExtension {
    /// Extension name
    pub name: String,
    /// Revision the driver implements
    pub spec_version: u32,
    /// When the extension is reported
    #[serde(rename = "enable", default)]
    pub enable_condition: EnableCondition,
    /// Driver-private extension not (yet) in the registry
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
    /// Kind for synthetic extensions; ignored for registry extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ExtensionKind>,
    /// Platform tag for synthetic extensions; ignored for registry extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_tag: Option<String>,
    /// Presentation flag for synthetic extensions; ignored for registry extensions
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub presentation: bool,
}

impl DeclaredExtension {
    /// Create a new declaration entry
    pub fn new(
        name: impl Into<String>,
        spec_version: u32,
        enable_condition: impl Into<EnableCondition>,
    ) -> Self {
        Self {
            name: name.into(),
            spec_version,
            enable_condition: enable_condition.into(),
            synthetic: false,
            kind: None,
            platform_tag: None,
            presentation: false,
        }
    }

    /// Mark as a synthetic (driver-private) extension
    pub fn synthetic(mut self, kind: ExtensionKind) -> Self {
        self.synthetic = true;
        self.kind = Some(kind);
        self
    }

    /// Set the platform tag used when the registry has no record
    pub fn with_platform(mut self, tag: impl Into<String>) -> Self {
        self.platform_tag = Some(tag.into());
        self
    }

    /// Mark a synthetic entry as a presentation extension
    pub fn presentation(mut self) -> Self {
        self.presentation = true;
        self
    }
}

/// Ordered list of extension declarations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverDeclaration {
    entries: Vec<DeclaredExtension>,
}

impl DriverDeclaration {
    /// Create an empty declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extension
    pub fn extension(
        mut self,
        name: impl Into<String>,
        spec_version: u32,
        enable_condition: impl Into<EnableCondition>,
    ) -> Self {
        self.entries
            .push(DeclaredExtension::new(name, spec_version, enable_condition));
        self
    }

    /// Append a prepared entry
    pub fn entry(mut self, entry: DeclaredExtension) -> Self {
        self.entries.push(entry);
        self
    }

    /// Append a prepared entry in place
    pub fn push(&mut self, entry: DeclaredExtension) {
        self.entries.push(entry);
    }

    /// Entries in source order
    pub fn entries(&self) -> &[DeclaredExtension] {
        &self.entries
    }

    /// Mutable access for policy filters
    pub fn entries_mut(&mut self) -> &mut [DeclaredExtension] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<DeclaredExtension>> for DriverDeclaration {
    fn from(entries: Vec<DeclaredExtension>) -> Self {
        Self { entries }
    }
}

impl FromIterator<DeclaredExtension> for DriverDeclaration {
    fn from_iter<I: IntoIterator<Item = DeclaredExtension>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An API version the table must carry as a synthetic entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotedVersion {
    pub version: ApiVersion,
    /// Reported condition; versions are unconditional unless stated
    #[serde(rename = "enable", default)]
    pub enable_condition: EnableCondition,
}

impl PromotedVersion {
    pub fn new(version: ApiVersion) -> Self {
        Self {
            version,
            enable_condition: EnableCondition::Always,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<EnableCondition>) -> Self {
        self.enable_condition = condition.into();
        self
    }
}

/// Maximum API version plus the versions the table represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPolicy {
    pub max_api_version: ApiVersion,
    #[serde(default)]
    pub promoted_versions: Vec<PromotedVersion>,
}

impl VersionPolicy {
    /// Policy with no promoted versions
    pub fn new(max_api_version: ApiVersion) -> Self {
        Self {
            max_api_version,
            promoted_versions: Vec::new(),
        }
    }

    /// Policy that promotes exactly the maximum version, unconditionally
    pub fn up_to(max_api_version: ApiVersion) -> Self {
        Self::new(max_api_version).promote(max_api_version)
    }

    /// Add an unconditional promoted version
    pub fn promote(mut self, version: ApiVersion) -> Self {
        self.promoted_versions.push(PromotedVersion::new(version));
        self
    }

    /// Add a promoted version gated by a condition
    pub fn promote_if(mut self, version: ApiVersion, condition: impl Into<EnableCondition>) -> Self {
        self.promoted_versions
            .push(PromotedVersion::new(version).with_condition(condition));
        self
    }
}

//! Extension table resolver
//!
//! Merges the specification registry, the driver declaration and the
//! version policy into one validated [`ExtensionTable`]. Resolution is a
//! pure function of its inputs and fails on the first problem found:
//!
//! 1. version policy validation
//! 2. version entries, ascending
//! 3. declaration walk in source order (lookup, spec version, core floor)
//! 4. duplicate names across the whole table
//! 5. dependency satisfaction for every entry that can be enabled
//!
//! Version terms in dependencies (and promotions into core) only count up to
//! the last promoted version that is unconditionally enabled, because the
//! emitted api-version walk stops at the first gated one.
//!
//! Entry order is the input order. Nothing is sorted, because the driver
//! indexes the emitted arrays by position.

use crate::ir::{
    ApiVersion, DeclaredExtension, DriverDeclaration, EnableCondition, EntryOrigin,
    ExtensionTable, ResolvedEntry, SpecRegistry, VersionPolicy,
};
use crate::resolve::PlatformSuppression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration errors found while resolving
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Declared name absent from the registry and not marked synthetic
    #[error("UnknownExtension: {name} is not defined by the registry and is not marked synthetic")]
    UnknownExtension { name: String },

    /// Declared revision newer than the registry's
    #[error("SpecVersionTooNew: {name} declares spec version {declared}, registry only knows {latest}")]
    SpecVersionTooNew {
        name: String,
        declared: u32,
        latest: u32,
    },

    /// Extension needs a core version above the maximum
    #[error("ExtensionUnreachable: {name} requires API {required}, maximum API version is {max}")]
    ExtensionUnreachable {
        name: String,
        required: ApiVersion,
        max: ApiVersion,
    },

    /// Same name twice in the table
    #[error("DuplicateExtensionName: {name} appears at table indices {first} and {second}")]
    DuplicateExtensionName {
        name: String,
        first: usize,
        second: usize,
    },

    /// Promoted versions out of range or out of order
    #[error("VersionPolicyInvalid: {version}: {reason}")]
    VersionPolicyInvalid { version: ApiVersion, reason: String },

    /// An enabled extension's dependency cannot be satisfied
    #[error("MissingDependency: {name} requires {dependency}")]
    MissingDependency { name: String, dependency: String },
}

impl ResolveError {
    /// Stable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::UnknownExtension { .. } => "UnknownExtension",
            ResolveError::SpecVersionTooNew { .. } => "SpecVersionTooNew",
            ResolveError::ExtensionUnreachable { .. } => "ExtensionUnreachable",
            ResolveError::DuplicateExtensionName { .. } => "DuplicateExtensionName",
            ResolveError::VersionPolicyInvalid { .. } => "VersionPolicyInvalid",
            ResolveError::MissingDependency { .. } => "MissingDependency",
        }
    }

    /// The offending extension name or version
    pub fn subject(&self) -> String {
        match self {
            ResolveError::UnknownExtension { name }
            | ResolveError::SpecVersionTooNew { name, .. }
            | ResolveError::ExtensionUnreachable { name, .. }
            | ResolveError::DuplicateExtensionName { name, .. }
            | ResolveError::MissingDependency { name, .. } => name.clone(),
            ResolveError::VersionPolicyInvalid { version, .. } => version.to_string(),
        }
    }
}

/// Whether registry dependencies are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPolicy {
    #[default]
    Enforce,
    Ignore,
}

/// Resolver over a registry and a version policy
pub struct Resolver<'a> {
    registry: &'a SpecRegistry,
    policy: &'a VersionPolicy,
    suppression: PlatformSuppression,
    dependencies: DependencyPolicy,
}

impl<'a> Resolver<'a> {
    /// Create a resolver with no suppression and enforced dependencies
    pub fn new(registry: &'a SpecRegistry, policy: &'a VersionPolicy) -> Self {
        Self {
            registry,
            policy,
            suppression: PlatformSuppression::default(),
            dependencies: DependencyPolicy::default(),
        }
    }

    /// Apply a platform suppression policy before the declaration walk
    pub fn with_suppression(mut self, suppression: PlatformSuppression) -> Self {
        self.suppression = suppression;
        self
    }

    /// Set the dependency policy
    pub fn with_dependency_policy(mut self, dependencies: DependencyPolicy) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Resolve a declaration into a table
    pub fn resolve(&self, declaration: &DriverDeclaration) -> Result<ExtensionTable, ResolveError> {
        self.validate_policy()?;

        let max = self.policy.max_api_version;
        let mut entries: Vec<ResolvedEntry> =
            Vec::with_capacity(self.policy.promoted_versions.len() + declaration.len());

        for promoted in &self.policy.promoted_versions {
            entries.push(ResolvedEntry {
                name: promoted.version.feature_name(),
                spec_version: None,
                enable_condition: promoted.enable_condition.clone(),
                origin: EntryOrigin::VersionPromotion,
                kind: None,
                platform_tag: None,
                output_index: entries.len(),
                api_version: Some(promoted.version),
            });
        }

        let filtered = self.suppression.apply(self.registry, declaration);
        for entry in filtered.entries() {
            let suppressed = self.suppression.excludes(self.registry, entry);
            let resolved = self.resolve_entry(entry, suppressed, max, entries.len())?;
            debug!(
                extension = %resolved.name,
                index = resolved.output_index,
                enable = %resolved.enable_condition,
                "extgen.resolve.entry"
            );
            entries.push(resolved);
        }

        check_duplicates(&entries)?;

        if self.dependencies == DependencyPolicy::Enforce {
            self.check_dependencies(&entries, self.guaranteed_version())?;
        }

        info!(
            entries = entries.len(),
            versions = self.policy.promoted_versions.len(),
            max_api_version = %max,
            "extgen.resolve"
        );

        Ok(ExtensionTable::new(max, entries))
    }

    fn validate_policy(&self) -> Result<(), ResolveError> {
        let max = self.policy.max_api_version;
        let mut previous: Option<ApiVersion> = None;

        for promoted in &self.policy.promoted_versions {
            let version = promoted.version;
            if version > max {
                return Err(ResolveError::VersionPolicyInvalid {
                    version,
                    reason: format!("exceeds the maximum API version {}", max),
                });
            }
            if let Some(prev) = previous {
                if version <= prev {
                    return Err(ResolveError::VersionPolicyInvalid {
                        version,
                        reason: format!("promoted versions must be strictly ascending (follows {})", prev),
                    });
                }
            }
            if self.registry.versions().next().is_some() && !self.registry.knows_version(&version) {
                return Err(ResolveError::VersionPolicyInvalid {
                    version,
                    reason: "not an API version defined by the registry".to_string(),
                });
            }
            previous = Some(version);
        }

        Ok(())
    }

    fn resolve_entry(
        &self,
        entry: &DeclaredExtension,
        suppressed: bool,
        max: ApiVersion,
        output_index: usize,
    ) -> Result<ResolvedEntry, ResolveError> {
        let Some(record) = self.registry.get(&entry.name) else {
            if !entry.synthetic {
                return Err(ResolveError::UnknownExtension {
                    name: entry.name.clone(),
                });
            }
            return Ok(ResolvedEntry {
                name: entry.name.clone(),
                spec_version: Some(entry.spec_version),
                enable_condition: entry.enable_condition.clone(),
                origin: EntryOrigin::Extension,
                kind: Some(entry.kind.unwrap_or_default()),
                platform_tag: entry.platform_tag.clone(),
                output_index,
                api_version: None,
            });
        };

        if entry.synthetic {
            warn!(
                extension = %entry.name,
                "declared synthetic but defined by the registry; validating against the registry"
            );
        }

        if entry.spec_version > record.spec_version {
            return Err(ResolveError::SpecVersionTooNew {
                name: entry.name.clone(),
                declared: entry.spec_version,
                latest: record.spec_version,
            });
        }

        if !suppressed && record.required_core_version > max {
            return Err(ResolveError::ExtensionUnreachable {
                name: entry.name.clone(),
                required: record.required_core_version,
                max,
            });
        }

        Ok(ResolvedEntry {
            name: entry.name.clone(),
            spec_version: Some(entry.spec_version),
            enable_condition: entry.enable_condition.clone(),
            origin: EntryOrigin::Extension,
            kind: Some(record.kind),
            platform_tag: record.platform_tag.clone(),
            output_index,
            api_version: None,
        })
    }

    /// Highest API version the generated walk reports whatever the flags
    fn guaranteed_version(&self) -> Option<ApiVersion> {
        self.policy
            .promoted_versions
            .iter()
            .take_while(|p| p.enable_condition == EnableCondition::Always)
            .last()
            .map(|p| p.version)
    }

    fn check_dependencies(
        &self,
        entries: &[ResolvedEntry],
        core: Option<ApiVersion>,
    ) -> Result<(), ResolveError> {
        let enabled: HashMap<&str, &ResolvedEntry> = entries
            .iter()
            .filter(|e| !e.is_version() && !e.enable_condition.is_never())
            .map(|e| (e.name.as_str(), e))
            .collect();

        let available = |name: &str| {
            enabled.contains_key(name)
                || self
                    .registry
                    .get(name)
                    .and_then(|r| r.promoted_to)
                    .is_some_and(|v| core.is_some_and(|core| v <= core))
        };

        for entry in entries.iter().filter(|e| enabled.contains_key(e.name.as_str())) {
            let Some(depends) = self.registry.get(&entry.name).and_then(|r| r.depends.as_ref()) else {
                continue;
            };
            if !depends.evaluate(core, &available) {
                return Err(ResolveError::MissingDependency {
                    name: entry.name.clone(),
                    dependency: depends.to_string(),
                });
            }
        }

        Ok(())
    }
}

fn check_duplicates(entries: &[ResolvedEntry]) -> Result<(), ResolveError> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
    for entry in entries {
        if let Some(first) = seen.insert(entry.name.as_str(), entry.output_index) {
            return Err(ResolveError::DuplicateExtensionName {
                name: entry.name.clone(),
                first,
                second: entry.output_index,
            });
        }
    }
    Ok(())
}

/// Resolve with no suppression and enforced dependencies
pub fn resolve(
    registry: &SpecRegistry,
    declaration: &DriverDeclaration,
    policy: &VersionPolicy,
) -> Result<ExtensionTable, ResolveError> {
    Resolver::new(registry, policy).resolve(declaration)
}

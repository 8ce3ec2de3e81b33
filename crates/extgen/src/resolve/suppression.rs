//! Platform suppression policy
//!
//! On some platforms the OS loader owns surfaces and swapchains, and a
//! driver that also advertises those extension strings gets them reported
//! twice. Suppression rewrites the enable condition of every excluded
//! declared extension to `Never`, before resolution. An entry is excluded
//! when its platform tag is in the set, or when the set holds [`WSI_TAG`]
//! and the entry is a presentation extension.

use crate::ir::{DeclaredExtension, DriverDeclaration, EnableCondition, SpecRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Tag that selects every presentation extension (`VK_KHR_surface`,
/// `VK_KHR_swapchain`, `VK_KHR_wayland_surface`, ...) whatever its platform
pub const WSI_TAG: &str = "wsi";

/// Set of excluded tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformSuppression {
    tags: BTreeSet<String>,
}

impl PlatformSuppression {
    /// Policy that suppresses nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for platforms whose OS loader owns presentation
    ///
    /// Only presentation extensions are excluded; other platform-bound
    /// extensions such as `VK_ANDROID_external_memory_android_hardware_buffer`
    /// keep their condition.
    pub fn os_owned_presentation() -> Self {
        Self::new().tag(WSI_TAG)
    }

    /// Exclude another tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Merge another policy into this one
    pub fn union(mut self, other: &PlatformSuppression) -> Self {
        self.tags.extend(other.tags.iter().cloned());
        self
    }

    pub fn suppresses(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Platform tag and presentation flag of a declared entry: the
    /// registry's when the registry knows the extension, otherwise the
    /// entry's own
    fn classify<'a>(registry: &'a SpecRegistry, entry: &'a DeclaredExtension) -> (Option<&'a str>, bool) {
        match registry.get(&entry.name) {
            Some(record) => (record.platform_tag.as_deref(), record.presentation),
            None => (entry.platform_tag.as_deref(), entry.presentation),
        }
    }

    /// Whether this policy excludes `entry`
    pub fn excludes(&self, registry: &SpecRegistry, entry: &DeclaredExtension) -> bool {
        let (platform, presentation) = Self::classify(registry, entry);
        (presentation && self.suppresses(WSI_TAG)) || platform.is_some_and(|tag| self.suppresses(tag))
    }

    /// Return a copy of `declaration` with excluded entries forced to `Never`
    pub fn apply(&self, registry: &SpecRegistry, declaration: &DriverDeclaration) -> DriverDeclaration {
        let mut filtered = declaration.clone();
        if self.is_empty() {
            return filtered;
        }

        for entry in filtered.entries_mut() {
            if self.excludes(registry, entry) && !entry.enable_condition.is_never() {
                debug!(
                    extension = %entry.name,
                    was = %entry.enable_condition,
                    "extgen.suppress"
                );
                entry.enable_condition = EnableCondition::Never;
            }
        }

        filtered
    }
}

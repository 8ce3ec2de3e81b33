//! Resolved extension table
//!
//! The resolver's output. Entries are stored in `output_index` order and the
//! table is never mutated once built.

use crate::ir::{ApiVersion, EnableCondition, ExtensionKind};
use serde::Serialize;

/// Where a table entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// A driver-declared extension
    Extension,
    /// A synthesized API version entry
    VersionPromotion,
}

/// One row of the emitted table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    /// Extension or feature name
    pub name: String,
    /// Implemented revision; absent for version entries
    pub spec_version: Option<u32>,
    /// Reported condition
    pub enable_condition: EnableCondition,
    /// Extension or version promotion
    pub origin: EntryOrigin,
    /// Instance or device; absent for version entries
    pub kind: Option<ExtensionKind>,
    /// Platform tag carried from the registry
    pub platform_tag: Option<String>,
    /// Position in the table
    pub output_index: usize,
    /// API version for version entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<ApiVersion>,
}

impl ResolvedEntry {
    pub fn is_version(&self) -> bool {
        self.origin == EntryOrigin::VersionPromotion
    }

    /// Member name in the generated C tables (`VK_KHR_surface` -> `KHR_surface`)
    pub fn table_field(&self) -> &str {
        self.name.strip_prefix("VK_").unwrap_or(&self.name)
    }
}

/// Validated, ordered extension table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionTable {
    max_api_version: ApiVersion,
    entries: Vec<ResolvedEntry>,
}

impl ExtensionTable {
    /// Assemble a table; callers guarantee indices match positions
    pub(crate) fn new(max_api_version: ApiVersion, entries: Vec<ResolvedEntry>) -> Self {
        debug_assert!(entries.iter().enumerate().all(|(i, e)| e.output_index == i));
        Self {
            max_api_version,
            entries,
        }
    }

    /// Maximum API version the table was resolved against
    pub fn max_api_version(&self) -> ApiVersion {
        self.max_api_version
    }

    /// All entries in output order
    pub fn entries(&self) -> &[ResolvedEntry] {
        &self.entries
    }

    /// Version entries, ascending
    pub fn versions(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.entries.iter().filter(|e| e.is_version())
    }

    /// Extension entries in declaration order
    pub fn extensions(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.entries.iter().filter(|e| !e.is_version())
    }

    /// Extensions of one kind, in declaration order
    pub fn extensions_of(&self, kind: ExtensionKind) -> impl Iterator<Item = &ResolvedEntry> {
        self.extensions().filter(move |e| e.kind == Some(kind))
    }

    pub fn instance_extensions(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.extensions_of(ExtensionKind::Instance)
    }

    pub fn device_extensions(&self) -> impl Iterator<Item = &ResolvedEntry> {
        self.extensions_of(ExtensionKind::Device)
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&ResolvedEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Distinct feature flags referenced by any entry, in first-use order
    pub fn feature_flags(&self) -> Vec<&str> {
        let mut flags: Vec<&str> = Vec::new();
        for flag in self.entries.iter().filter_map(|e| e.enable_condition.flag_name()) {
            if !flags.contains(&flag) {
                flags.push(flag);
            }
        }
        flags
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

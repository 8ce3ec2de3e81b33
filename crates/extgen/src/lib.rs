//! extgen: extension table generation for Vulkan drivers
//!
//! Resolves a driver's extension declaration against the specification
//! registry and emits the C tables the driver compiles in: the advertised
//! instance and device extensions, their spec versions, and the conditions
//! under which each one is reported.
//!
//! # Architecture
//!
//! - `ir`: registry records, declarations, versions and the resolved table
//! - `load`: `vk.xml` registry loader and TOML declaration files
//! - `resolve`: the resolver and platform suppression policy
//! - `codegen`: C header/source and JSON manifest generators
//! - `build`: the end-to-end pipeline and build script utilities
//!
//! # Usage
//!
//! In a driver crate's `build.rs`:
//!
//! ```rust,ignore
//! use extgen::build::TableBuilder;
//!
//! fn main() {
//!     TableBuilder::new("vulkan/panvk_extensions.toml")
//!         .xml("registry/vk.xml")
//!         .os_owned_presentation(std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android"))
//!         .build()
//!         .expect("Failed to generate extension tables");
//! }
//! ```

pub mod ir;
pub mod load;
pub mod resolve;
pub mod codegen;
pub mod build;

// Re-export commonly used types
pub use ir::{
    ApiVersion, DeclaredExtension, DependencyExpr, DriverDeclaration, EnableCondition,
    EntryOrigin, ExtensionKind, ExtensionRecord, ExtensionTable, PromotedVersion,
    RegistryError, ResolvedEntry, SpecRegistry, VersionPolicy,
};
pub use load::{ConfigError, DeclarationFile, RegistryLoader};
pub use resolve::{resolve, DependencyPolicy, PlatformSuppression, ResolveError, Resolver};
pub use codegen::{CGenerator, GeneratedSources, ManifestGenerator};
pub use build::{generate, BuildError, GenerateRequest, OutputPaths, TableBuilder};

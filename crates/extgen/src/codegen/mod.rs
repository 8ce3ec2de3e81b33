//! Code generation for extension tables
//!
//! This module provides generators for:
//! - the C header and source a driver compiles in
//! - a JSON manifest of the resolved table

pub mod c;
pub mod manifest;

pub use c::{CGenerator, GeneratedSources, EXTRA_GUARDS};
pub use manifest::ManifestGenerator;

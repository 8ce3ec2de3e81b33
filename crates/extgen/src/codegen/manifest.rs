//! JSON manifest of a resolved table
//!
//! A machine-readable copy of what the C sources encode, for tooling that
//! wants the table without parsing C.

use crate::ir::ExtensionTable;
use serde::Serialize;

#[derive(Serialize)]
struct Manifest<'a> {
    driver: &'a str,
    #[serde(flatten)]
    table: &'a ExtensionTable,
}

/// Generator for the JSON manifest
pub struct ManifestGenerator<'a> {
    table: &'a ExtensionTable,
    prefix: &'a str,
}

impl<'a> ManifestGenerator<'a> {
    pub fn new(table: &'a ExtensionTable, prefix: &'a str) -> Self {
        Self { table, prefix }
    }

    /// Pretty-printed JSON, newline terminated
    pub fn generate(&self) -> Result<String, serde_json::Error> {
        let manifest = Manifest {
            driver: self.prefix,
            table: self.table,
        };
        let mut json = serde_json::to_string_pretty(&manifest)?;
        json.push('\n');
        Ok(json)
    }
}

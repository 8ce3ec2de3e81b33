//! TableBuilder for build.rs scripts
//!
//! Wraps the pipeline for crates that compile the generated C themselves:
//! inputs are resolved against `CARGO_MANIFEST_DIR`, outputs land in
//! `OUT_DIR`, and every input gets a `cargo:rerun-if-changed` line.

use crate::build::pipeline::{run, BuildError, GenerateRequest, OutputPaths};
use std::env;
use std::path::{Path, PathBuf};

/// Builder for extension tables in build scripts
///
/// # Example
/// ```ignore
/// use extgen::build::TableBuilder;
///
/// fn main() {
///     TableBuilder::new("vulkan/panvk_extensions.toml")
///         .xml("vulkan/registry/vk.xml")
///         .include("panvk_private.h")
///         .build()
///         .expect("Failed to generate extension tables");
/// }
/// ```
pub struct TableBuilder {
    declaration: PathBuf,
    xml_files: Vec<PathBuf>,
    prefix: Option<String>,
    os_owned_presentation: bool,
    suppress_platforms: Vec<String>,
    includes: Vec<String>,
    manifest: bool,
}

impl TableBuilder {
    /// Create a builder for a declaration file (relative to the crate root)
    pub fn new(declaration: impl AsRef<Path>) -> Self {
        Self {
            declaration: declaration.as_ref().to_path_buf(),
            xml_files: Vec::new(),
            prefix: None,
            os_owned_presentation: false,
            suppress_platforms: Vec::new(),
            includes: Vec::new(),
            manifest: false,
        }
    }

    /// Add a registry document (relative to the crate root)
    pub fn xml(mut self, path: impl AsRef<Path>) -> Self {
        self.xml_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Override the declaration's driver prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Suppress presentation extensions for an OS-owned loader
    pub fn os_owned_presentation(mut self, enabled: bool) -> Self {
        self.os_owned_presentation = enabled;
        self
    }

    pub fn suppress_platform(mut self, tag: impl Into<String>) -> Self {
        self.suppress_platforms.push(tag.into());
        self
    }

    /// Extra header the generated source includes
    pub fn include(mut self, header: impl Into<String>) -> Self {
        self.includes.push(header.into());
        self
    }

    /// Also write `<prefix>_extensions.json`
    pub fn manifest(mut self) -> Self {
        self.manifest = true;
        self
    }

    fn request(&self, manifest_dir: &Path) -> GenerateRequest {
        let xml_files: Vec<PathBuf> = self.xml_files.iter().map(|p| manifest_dir.join(p)).collect();
        let mut request = GenerateRequest::new(&xml_files, manifest_dir.join(&self.declaration));
        request.prefix = self.prefix.clone();
        request.os_owned_presentation = self.os_owned_presentation;
        request.suppress_platforms = self.suppress_platforms.clone();
        request.includes = self.includes.clone();
        request.manifest = self.manifest;
        request
    }

    /// Generate into `OUT_DIR` and return the written paths
    ///
    /// The output stem is `<prefix>_extensions`, where the prefix is the
    /// override if set and otherwise read from the declaration.
    pub fn build(self) -> Result<OutputPaths, BuildError> {
        let out_dir = env::var("OUT_DIR")
            .map_err(|_| BuildError::EnvVarMissing("OUT_DIR".to_string()))?;
        let manifest_dir = env::var("CARGO_MANIFEST_DIR")
            .map_err(|_| BuildError::EnvVarMissing("CARGO_MANIFEST_DIR".to_string()))?;

        let paths = self.build_into(Path::new(&manifest_dir), Path::new(&out_dir))?;

        for input in self.request(Path::new(&manifest_dir)).inputs() {
            println!("cargo:rerun-if-changed={}", input.display());
        }
        Ok(paths)
    }

    /// Same as [`build`](Self::build) with explicit directories
    pub fn build_into(&self, manifest_dir: &Path, out_dir: &Path) -> Result<OutputPaths, BuildError> {
        let prefix = match &self.prefix {
            Some(prefix) => prefix.clone(),
            None => crate::load::DeclarationFile::load(manifest_dir.join(&self.declaration))?.driver,
        };
        let stem = format!("{}_extensions", prefix);

        let paths = OutputPaths {
            header: out_dir.join(format!("{}.h", stem)),
            source: out_dir.join(format!("{}.c", stem)),
            manifest: self.manifest.then(|| out_dir.join(format!("{}.json", stem))),
        };
        run(&self.request(manifest_dir), &paths)?;
        Ok(paths)
    }
}

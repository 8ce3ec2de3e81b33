//! Load, resolve, emit, then write
//!
//! Everything up to and including code generation happens in memory. Files
//! are only touched once every artifact exists, and each one goes through a
//! temporary sibling that is renamed into place, so a failed run leaves the
//! previous outputs untouched.

use crate::codegen::{CGenerator, GeneratedSources, ManifestGenerator};
use crate::ir::RegistryError;
use crate::load::{ConfigError, DeclarationFile, RegistryLoader, DEFAULT_API};
use crate::resolve::{PlatformSuppression, ResolveError, Resolver};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while generating a table
#[derive(Debug, Error)]
pub enum BuildError {
    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarMissing(String),

    /// Output could not be written
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry could not be loaded
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Declaration file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Declaration does not resolve against the registry
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Manifest serialisation failed
    #[error("failed to serialise manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl BuildError {
    /// Stable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::EnvVarMissing(_) => "EnvVarMissing",
            BuildError::Io { .. } => "Io",
            BuildError::Registry(_) => "RegistryError",
            BuildError::Config(_) => "ConfigError",
            BuildError::Resolve(e) => e.kind(),
            BuildError::Manifest(_) => "Manifest",
        }
    }
}

/// Inputs and options for one generation run
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Registry documents, merged in order
    pub xml_files: Vec<PathBuf>,
    /// Driver declaration file
    pub declaration: PathBuf,
    /// Overrides `max_api_version` from the declaration
    pub max_api_version: Option<String>,
    /// Overrides `driver` from the declaration
    pub prefix: Option<String>,
    /// Adds the OS-owned presentation preset to the file's suppression
    pub os_owned_presentation: bool,
    /// Extra platform tags to suppress
    pub suppress_platforms: Vec<String>,
    /// Also render the JSON manifest
    pub manifest: bool,
    /// API name matched in the registry
    pub api: String,
    /// Header name the source includes; defaults to `<prefix>_extensions.h`
    pub header_name: Option<String>,
    /// Extra headers the source includes
    pub includes: Vec<String>,
}

impl GenerateRequest {
    pub fn new<P: AsRef<Path>>(xml_files: &[P], declaration: impl AsRef<Path>) -> Self {
        Self {
            xml_files: xml_files.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            declaration: declaration.as_ref().to_path_buf(),
            max_api_version: None,
            prefix: None,
            os_owned_presentation: false,
            suppress_platforms: Vec::new(),
            manifest: false,
            api: DEFAULT_API.to_string(),
            header_name: None,
            includes: Vec::new(),
        }
    }

    pub fn max_api_version(mut self, version: impl Into<String>) -> Self {
        self.max_api_version = Some(version.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn os_owned_presentation(mut self, enabled: bool) -> Self {
        self.os_owned_presentation = enabled;
        self
    }

    pub fn suppress_platform(mut self, tag: impl Into<String>) -> Self {
        self.suppress_platforms.push(tag.into());
        self
    }

    pub fn with_manifest(mut self) -> Self {
        self.manifest = true;
        self
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = Some(name.into());
        self
    }

    pub fn include(mut self, header: impl Into<String>) -> Self {
        self.includes.push(header.into());
        self
    }

    /// Every file the run reads
    pub fn inputs(&self) -> impl Iterator<Item = &Path> {
        self.xml_files
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.declaration.as_path()))
    }

    fn suppression(&self, file: &DeclarationFile) -> PlatformSuppression {
        let mut policy = file.suppression();
        if self.os_owned_presentation {
            policy = policy.union(&PlatformSuppression::os_owned_presentation());
        }
        self.suppress_platforms
            .iter()
            .fold(policy, |policy, tag| policy.tag(tag.as_str()))
    }
}

/// Run the pipeline in memory; nothing is written
pub fn generate(request: &GenerateRequest) -> Result<GeneratedSources, BuildError> {
    let registry = RegistryLoader::new()
        .api(request.api.as_str())
        .load_files(&request.xml_files)?;

    let mut file = DeclarationFile::load(&request.declaration)?;
    if let Some(version) = &request.max_api_version {
        file.override_max_api_version(version)?;
    }
    if let Some(prefix) = &request.prefix {
        file.override_driver(prefix)?;
    }

    let suppression = request.suppression(&file);
    debug!(
        tags = ?suppression.tags().collect::<Vec<_>>(),
        "extgen.suppression"
    );

    let policy = file.version_policy();
    let table = Resolver::new(&registry, &policy)
        .with_suppression(suppression)
        .with_dependency_policy(file.dependency_policy())
        .resolve(&file.declaration())?;

    let mut generator = CGenerator::new(&table, &file.driver)
        .platform_guards(registry.platform_guards().map(str::to_string));
    if let Some(name) = &request.header_name {
        generator = generator.header_name(name.as_str());
    }
    for include in &request.includes {
        generator = generator.include(include.as_str());
    }

    let mut sources = generator.generate();
    if request.manifest {
        sources.manifest = Some(ManifestGenerator::new(&table, &file.driver).generate()?);
    }

    info!(
        driver = %file.driver,
        instance = table.instance_extensions().count(),
        device = table.device_extensions().count(),
        "extgen.generate"
    );
    Ok(sources)
}

/// Destination paths for [`write_outputs`]
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub header: PathBuf,
    pub source: PathBuf,
    pub manifest: Option<PathBuf>,
}

/// Write every artifact, each through a temporary sibling
///
/// All temporaries are written before any of them is renamed, so an IO
/// failure while writing leaves every destination as it was. The renames
/// themselves run header, source, manifest; if a later one fails the earlier
/// destinations already hold the new contents. Files are created with the
/// process umask applied, like any other build output.
pub fn write_outputs(sources: &GeneratedSources, paths: &OutputPaths) -> Result<(), BuildError> {
    let mut pending: Vec<(NamedTempFile, &Path)> = Vec::new();

    pending.push((stage(&paths.header, &sources.header)?, paths.header.as_path()));
    pending.push((stage(&paths.source, &sources.source)?, paths.source.as_path()));
    if let (Some(path), Some(manifest)) = (&paths.manifest, &sources.manifest) {
        pending.push((stage(path, manifest)?, path.as_path()));
    }

    for (temp, path) in pending {
        temp.persist(path).map_err(|e| BuildError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        debug!(path = %path.display(), "extgen.write");
    }
    Ok(())
}

fn stage(path: &Path, contents: &str) -> Result<NamedTempFile, BuildError> {
    let io_err = |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut temp = temp_builder().tempfile_in(dir).map_err(io_err)?;
    temp.write_all(contents.as_bytes()).map_err(io_err)?;
    temp.flush().map_err(io_err)?;
    Ok(temp)
}

#[cfg(unix)]
fn temp_builder() -> Builder<'static, 'static> {
    use std::os::unix::fs::PermissionsExt;

    // tempfile defaults to 0600; 0666 lets the umask decide
    let mut builder = Builder::new();
    builder.permissions(std::fs::Permissions::from_mode(0o666));
    builder
}

#[cfg(not(unix))]
fn temp_builder() -> Builder<'static, 'static> {
    Builder::new()
}

/// Generate and write in one step
pub fn run(request: &GenerateRequest, paths: &OutputPaths) -> Result<GeneratedSources, BuildError> {
    let sources = generate(request)?;
    write_outputs(&sources, paths)?;
    Ok(sources)
}

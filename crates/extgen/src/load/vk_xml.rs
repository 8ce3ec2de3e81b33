//! Registry loader for the vendor XML specification (`vk.xml`)
//!
//! Only the parts the resolver and emitter need are read: platform guard
//! macros, API feature versions and the extension list with each
//! extension's number, type, spec version, platform and dependencies.

use crate::ir::{ApiVersion, DependencyExpr, ExtensionKind, ExtensionRecord, RegistryError, SpecRegistry};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

/// Default API name matched against `api` and `supported` attributes
pub const DEFAULT_API: &str = "vulkan";

/// Loads one or more registry documents into a [`SpecRegistry`]
#[derive(Debug, Clone)]
pub struct RegistryLoader {
    api: String,
}

impl Default for RegistryLoader {
    fn default() -> Self {
        Self {
            api: DEFAULT_API.to_string(),
        }
    }
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the API whose features and extensions are kept
    pub fn api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    /// Load and merge several documents; names and numbers must be unique
    /// across all of them
    pub fn load_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<SpecRegistry, RegistryError> {
        let mut registry = SpecRegistry::new();
        for path in paths {
            registry.merge(self.load_file(path.as_ref())?)?;
        }
        info!(
            documents = paths.len(),
            extensions = registry.len(),
            "extgen.registry.loaded"
        );
        Ok(registry)
    }

    /// Load a single document
    pub fn load_file(&self, path: &Path) -> Result<SpecRegistry, RegistryError> {
        let file = File::open(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_reader(BufReader::new(file), path)
    }

    /// Load a document held in memory; `origin` is only used in errors
    pub fn load_str(&self, xml: &str, origin: impl AsRef<Path>) -> Result<SpecRegistry, RegistryError> {
        self.load_reader(xml.as_bytes(), origin.as_ref())
    }

    fn load_reader<R: Read>(&self, reader: R, origin: &Path) -> Result<SpecRegistry, RegistryError> {
        let mut registry = SpecRegistry::new();
        let mut stack: Vec<String> = Vec::new();
        let mut pending: Option<PendingExtension> = None;
        let mut skipped = 0usize;

        for event in EventReader::new(reader) {
            let event = event.map_err(|e| RegistryError::Xml {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

            match event {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => {
                    let parent = stack.last().map(String::as_str);
                    match (parent, name.local_name.as_str()) {
                        (Some("platforms"), "platform") => {
                            let platform = required(&attributes, "platform", "name", None)?;
                            let protect = required(&attributes, "platform", "protect", Some(platform))?;
                            registry.add_platform(platform, protect);
                        }
                        (Some("registry"), "feature") => {
                            if let Some(version) = self.feature_version(&attributes)? {
                                registry.add_version(version);
                            }
                        }
                        (Some("extensions"), "extension") => {
                            let ext = self.begin_extension(&attributes)?;
                            if ext.is_none() {
                                skipped += 1;
                            }
                            pending = ext;
                        }
                        (Some("require"), "enum") => {
                            if let Some(ext) = pending.as_mut() {
                                ext.read_enum(&attributes)?;
                            }
                        }
                        _ => {}
                    }
                    stack.push(name.local_name);
                }
                XmlEvent::EndElement { name } => {
                    stack.pop();
                    if name.local_name == "extension" {
                        if let Some(ext) = pending.take() {
                            registry.insert(ext.finish()?)?;
                        }
                    }
                }
                _ => {}
            }
        }

        debug!(
            path = %origin.display(),
            extensions = registry.len(),
            skipped,
            "extgen.registry.document"
        );
        Ok(registry)
    }

    fn supports(&self, list: &str) -> bool {
        list.split(',').any(|api| api.trim() == self.api)
    }

    fn feature_version(&self, attributes: &[OwnedAttribute]) -> Result<Option<ApiVersion>, RegistryError> {
        if let Some(api) = attr(attributes, "api") {
            if !self.supports(api) {
                return Ok(None);
            }
        }
        let name = required(attributes, "feature", "name", None)?;
        let version = match attr(attributes, "number") {
            Some(number) => parse_version("feature", "number", number)?,
            None => ApiVersion::from_feature_name(name).ok_or_else(|| RegistryError::InvalidAttribute {
                element: "feature".to_string(),
                attribute: "name".to_string(),
                value: name.to_string(),
                message: "not a version feature name".to_string(),
            })?,
        };
        Ok(Some(version))
    }

    fn begin_extension(&self, attributes: &[OwnedAttribute]) -> Result<Option<PendingExtension>, RegistryError> {
        let name = required(attributes, "extension", "name", None)?;
        if let Some(supported) = attr(attributes, "supported") {
            if !self.supports(supported) {
                return Ok(None);
            }
        }

        let number = required(attributes, "extension", "number", Some(name))?;
        let numeric_id = number.parse::<u32>().map_err(|e| RegistryError::InvalidAttribute {
            element: format!("extension {}", name),
            attribute: "number".to_string(),
            value: number.to_string(),
            message: e.to_string(),
        })?;

        let kind_attr = required(attributes, "extension", "type", Some(name))?;
        let kind = kind_attr
            .parse::<ExtensionKind>()
            .map_err(|message| RegistryError::InvalidAttribute {
                element: format!("extension {}", name),
                attribute: "type".to_string(),
                value: kind_attr.to_string(),
                message,
            })?;

        let depends = match (attr(attributes, "depends"), attr(attributes, "requires")) {
            (Some(expr), _) => Some(DependencyExpr::parse(expr).map_err(|e| RegistryError::InvalidAttribute {
                element: format!("extension {}", name),
                attribute: "depends".to_string(),
                value: expr.to_string(),
                message: e.message,
            })?),
            (None, Some(list)) => DependencyExpr::from_requires(list),
            (None, None) => None,
        };

        let requires_core = attr(attributes, "requiresCore")
            .map(|v| parse_version("extension", "requiresCore", v))
            .transpose()?;

        let promoted_to = attr(attributes, "promotedto").and_then(ApiVersion::from_feature_name);

        Ok(Some(PendingExtension {
            name: name.to_string(),
            numeric_id,
            kind,
            spec_version: None,
            requires_core,
            depends,
            platform_tag: attr(attributes, "platform").map(str::to_string),
            presentation: is_presentation_extension(name),
            promoted_to,
        }))
    }
}

/// Window-system integration extensions, platform-bound or not
fn is_presentation_extension(name: &str) -> bool {
    name.contains("_surface")
        || name.contains("swapchain")
        || name.contains("_display")
        || name.contains("_present")
}

struct PendingExtension {
    name: String,
    numeric_id: u32,
    kind: ExtensionKind,
    spec_version: Option<u32>,
    requires_core: Option<ApiVersion>,
    depends: Option<DependencyExpr>,
    platform_tag: Option<String>,
    presentation: bool,
    promoted_to: Option<ApiVersion>,
}

impl PendingExtension {
    fn read_enum(&mut self, attributes: &[OwnedAttribute]) -> Result<(), RegistryError> {
        let Some(enum_name) = attr(attributes, "name") else {
            return Ok(());
        };
        if !enum_name.ends_with("_SPEC_VERSION") || self.spec_version.is_some() {
            return Ok(());
        }
        let Some(value) = attr(attributes, "value") else {
            return Ok(());
        };

        let parsed = value
            .trim_matches('"')
            .parse::<u32>()
            .map_err(|e| RegistryError::InvalidAttribute {
                element: format!("enum {}", enum_name),
                attribute: "value".to_string(),
                value: value.to_string(),
                message: e.to_string(),
            })?;
        self.spec_version = Some(parsed);
        Ok(())
    }

    fn finish(self) -> Result<ExtensionRecord, RegistryError> {
        let spec_version = self.spec_version.ok_or_else(|| RegistryError::MissingAttribute {
            element: "enum".to_string(),
            attribute: "value".to_string(),
            context: Some(format!("{} has no _SPEC_VERSION enum", self.name)),
        })?;

        let required_core_version = self
            .requires_core
            .or_else(|| self.depends.as_ref().and_then(DependencyExpr::minimum_core_version))
            .unwrap_or(ApiVersion::FLOOR);

        Ok(ExtensionRecord {
            name: self.name,
            numeric_id: self.numeric_id,
            kind: self.kind,
            spec_version,
            required_core_version,
            platform_tag: self.platform_tag,
            presentation: self.presentation,
            depends: self.depends,
            promoted_to: self.promoted_to,
        })
    }
}

fn attr<'a>(attributes: &'a [OwnedAttribute], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.local_name == key)
        .map(|a| a.value.as_str())
}

fn required<'a>(
    attributes: &'a [OwnedAttribute],
    element: &str,
    key: &str,
    context: Option<&str>,
) -> Result<&'a str, RegistryError> {
    attr(attributes, key).ok_or_else(|| RegistryError::MissingAttribute {
        element: element.to_string(),
        attribute: key.to_string(),
        context: context.map(str::to_string),
    })
}

fn parse_version(element: &str, attribute: &str, value: &str) -> Result<ApiVersion, RegistryError> {
    value.parse().map_err(|e: crate::ir::VersionParseError| RegistryError::InvalidAttribute {
        element: element.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

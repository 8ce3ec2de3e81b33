//! C header/source generator
//!
//! Renders a resolved [`ExtensionTable`] as the pair of files a driver
//! compiles in: the header declares the per-kind tables and counts, the
//! source defines the property arrays, the instance support table and the
//! two functions that evaluate enable conditions at runtime.

use crate::ir::{ExtensionKind, ExtensionTable, ResolvedEntry};
use std::collections::BTreeSet;

/// Macros normalised like platform guards even when the registry does not
/// list them
pub const EXTRA_GUARDS: &[&str] = &["ANDROID"];

const BANNER: &str = "/* Generated by extgen. Do not edit. */\n\n";

/// Header and source text for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSources {
    pub header: String,
    pub source: String,
    /// JSON manifest, when requested
    pub manifest: Option<String>,
}

/// Generator for the driver's extension table sources
pub struct CGenerator<'a> {
    table: &'a ExtensionTable,
    prefix: &'a str,
    header_name: String,
    includes: Vec<String>,
    guards: BTreeSet<String>,
}

impl<'a> CGenerator<'a> {
    /// Create a generator emitting symbols prefixed with `prefix`
    pub fn new(table: &'a ExtensionTable, prefix: &'a str) -> Self {
        Self {
            table,
            prefix,
            header_name: format!("{}_extensions.h", prefix),
            includes: Vec::new(),
            guards: EXTRA_GUARDS.iter().map(|g| g.to_string()).collect(),
        }
    }

    /// Name the source file uses to include the header
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Extra header included by the source after the generated one
    pub fn include(mut self, header: impl Into<String>) -> Self {
        self.includes.push(header.into());
        self
    }

    /// Macros normalised with `#ifdef` instead of defaulting to false
    pub fn platform_guards<I, S>(mut self, guards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guards.extend(guards.into_iter().map(Into::into));
        self
    }

    /// Render both files
    pub fn generate(&self) -> GeneratedSources {
        GeneratedSources {
            header: self.generate_header(),
            source: self.generate_source(),
            manifest: None,
        }
    }

    fn upper(&self) -> String {
        self.prefix.to_ascii_uppercase()
    }

    fn count_macro(&self, kind: ExtensionKind) -> String {
        format!("{}_{}_EXTENSION_COUNT", self.upper(), kind.as_str().to_ascii_uppercase())
    }

    fn entries_of(&self, kind: ExtensionKind) -> Vec<&'a ResolvedEntry> {
        self.table.extensions_of(kind).collect()
    }

    /// Generate the header
    pub fn generate_header(&self) -> String {
        let mut output = String::from(BANNER);
        let guard = format!("{}_EXTENSIONS_H", self.upper());

        output.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
        output.push_str("#include <stdbool.h>\n");
        output.push_str("#include <stdint.h>\n");
        output.push_str("#include <vulkan/vulkan_core.h>\n\n");

        output.push_str(&format!(
            "#define {}_MAX_API_VERSION {}\n\n",
            self.upper(),
            self.table.max_api_version().c_literal()
        ));

        for kind in [ExtensionKind::Instance, ExtensionKind::Device] {
            output.push_str(&self.header_kind_block(kind));
        }

        output.push_str(&format!("struct {}_physical_device;\n\n", self.prefix));
        output.push_str(&format!(
            "uint32_t {}_physical_device_api_version(const struct {}_physical_device *device);\n\n",
            self.prefix, self.prefix
        ));

        if !self.entries_of(ExtensionKind::Device).is_empty() {
            output.push_str(&format!(
                "void {}_fill_device_extension_table(const struct {}_physical_device *device,\n",
                self.prefix, self.prefix
            ));
            output.push_str(&format!(
                "{}struct {}_device_extension_table *extensions);\n\n",
                " ".repeat(self.prefix.len() + 34),
                self.prefix
            ));
        }

        output.push_str(&format!("#endif /* {} */\n", guard));
        output
    }

    fn header_kind_block(&self, kind: ExtensionKind) -> String {
        let mut output = String::new();
        let entries = self.entries_of(kind);
        let count = self.count_macro(kind);
        let kind_name = kind.as_str();

        output.push_str(&format!("#define {} {}\n\n", count, entries.len()));
        if entries.is_empty() {
            return output;
        }

        output.push_str(&format!(
            "extern const VkExtensionProperties {}_{}_extensions[{}];\n\n",
            self.prefix, kind_name, count
        ));

        output.push_str(&format!("struct {}_{}_extension_table {{\n", self.prefix, kind_name));
        output.push_str("   union {\n");
        output.push_str(&format!("      bool extensions[{}];\n", count));
        output.push_str("      struct {\n");
        for entry in &entries {
            output.push_str(&format!("         bool {};\n", entry.table_field()));
        }
        output.push_str("      };\n");
        output.push_str("   };\n");
        output.push_str("};\n\n");

        if kind == ExtensionKind::Instance {
            output.push_str(&format!(
                "extern const struct {}_instance_extension_table {}_supported_instance_extensions;\n\n",
                self.prefix, self.prefix
            ));
        }

        output
    }

    /// Generate the source
    pub fn generate_source(&self) -> String {
        let mut output = String::from(BANNER);

        output.push_str(&format!("#include \"{}\"\n", self.header_name));
        for include in &self.includes {
            output.push_str(&format!("#include \"{}\"\n", include));
        }
        output.push('\n');

        output.push_str(&self.generate_flag_normalization());

        let instance = self.entries_of(ExtensionKind::Instance);
        if !instance.is_empty() {
            output.push_str(&self.generate_properties(ExtensionKind::Instance, &instance));
            output.push_str(&format!(
                "const struct {}_instance_extension_table {}_supported_instance_extensions = {{\n",
                self.prefix, self.prefix
            ));
            for entry in &instance {
                output.push_str(&format!(
                    "   .{} = {},\n",
                    entry.table_field(),
                    entry.enable_condition.c_expr()
                ));
            }
            output.push_str("};\n\n");
        }

        output.push_str(&self.generate_api_version_fn());

        let device = self.entries_of(ExtensionKind::Device);
        if !device.is_empty() {
            output.push_str(&self.generate_properties(ExtensionKind::Device, &device));
            output.push_str(&self.generate_fill_fn(&device));
        }

        output
    }

    /// Platform guards become `true`/`false`; other flags default to false
    fn generate_flag_normalization(&self) -> String {
        let mut output = String::new();
        let flags = self.table.feature_flags();
        let (guards, plain): (Vec<&str>, Vec<&str>) =
            flags.into_iter().partition(|f| self.guards.contains(*f));

        if !guards.is_empty() {
            output.push_str("/* Convert platform guards to booleans */\n");
            for flag in &guards {
                output.push_str(&format!("#ifdef {}\n", flag));
                output.push_str(&format!("#   undef {}\n", flag));
                output.push_str(&format!("#   define {} true\n", flag));
                output.push_str("#else\n");
                output.push_str(&format!("#   define {} false\n", flag));
                output.push_str("#endif\n");
            }
            output.push('\n');
        }

        if !plain.is_empty() {
            for flag in &plain {
                output.push_str(&format!("#ifndef {}\n", flag));
                output.push_str(&format!("#   define {} false\n", flag));
                output.push_str("#endif\n");
            }
            output.push('\n');
        }

        output
    }

    fn generate_properties(&self, kind: ExtensionKind, entries: &[&ResolvedEntry]) -> String {
        let mut output = format!(
            "const VkExtensionProperties {}_{}_extensions[{}] = {{\n",
            self.prefix,
            kind.as_str(),
            self.count_macro(kind)
        );
        for entry in entries {
            output.push_str(&format!(
                "   {{\"{}\", {}}},\n",
                entry.name,
                entry.spec_version.unwrap_or_default()
            ));
        }
        output.push_str("};\n\n");
        output
    }

    /// Walk promoted versions in ascending order, stopping at the first
    /// disabled one
    fn generate_api_version_fn(&self) -> String {
        let mut output = String::from("uint32_t\n");
        output.push_str(&format!(
            "{}_physical_device_api_version(const struct {}_physical_device *device)\n",
            self.prefix, self.prefix
        ));
        output.push_str("{\n");
        output.push_str("   uint32_t version = 0;\n\n");
        output.push_str("   (void)device;\n\n");

        for entry in self.table.versions() {
            let Some(version) = entry.api_version else {
                continue;
            };
            output.push_str(&format!(
                "   if (!({}))\n      return version;\n",
                entry.enable_condition.c_expr()
            ));
            output.push_str(&format!("   version = {};\n\n", version.c_literal()));
        }

        output.push_str("   return version;\n");
        output.push_str("}\n\n");
        output
    }

    fn generate_fill_fn(&self, entries: &[&ResolvedEntry]) -> String {
        let name = format!("{}_fill_device_extension_table", self.prefix);
        let mut output = String::from("void\n");
        output.push_str(&format!(
            "{}(const struct {}_physical_device *device,\n",
            name, self.prefix
        ));
        output.push_str(&format!(
            "{}struct {}_device_extension_table *extensions)\n",
            " ".repeat(name.len() + 1),
            self.prefix
        ));
        output.push_str("{\n");
        output.push_str("   (void)device;\n\n");
        output.push_str(&format!(
            "   *extensions = (struct {}_device_extension_table) {{\n",
            self.prefix
        ));
        for entry in entries {
            output.push_str(&format!(
                "      .{} = {},\n",
                entry.table_field(),
                entry.enable_condition.c_expr()
            ));
        }
        output.push_str("   };\n");
        output.push_str("}\n");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        ApiVersion, DeclaredExtension, DriverDeclaration, ExtensionRecord, SpecRegistry,
        VersionPolicy,
    };
    use crate::resolve::Resolver;
    use pretty_assertions::assert_eq;

    fn registry() -> SpecRegistry {
        let mut registry = SpecRegistry::new()
            .with_version(ApiVersion::new(1, 0, 0))
            .with_version(ApiVersion::new(1, 1, 0))
            .with_extension(ExtensionRecord::new("VK_KHR_surface", 1, 25).instance().presentation())
            .unwrap()
            .with_extension(ExtensionRecord::new("VK_KHR_swapchain", 2, 70).presentation())
            .unwrap()
            .with_extension(
                ExtensionRecord::new("VK_KHR_wayland_surface", 7, 6)
                    .instance()
                    .with_platform("wayland"),
            )
            .unwrap()
            .with_extension(ExtensionRecord::new("VK_EXT_custom_border_color", 288, 12))
            .unwrap()
            .with_extension(ExtensionRecord::new("VK_KHR_display", 3, 23).instance().presentation())
            .unwrap();
        registry.add_platform("wayland", "VK_USE_PLATFORM_WAYLAND_KHR");
        registry
    }

    fn table() -> ExtensionTable {
        let declaration = DriverDeclaration::new()
            .extension("VK_KHR_surface", 25, "PANVK_HAS_SURFACE")
            .extension("VK_KHR_swapchain", 68, "PANVK_HAS_SURFACE")
            .extension("VK_KHR_wayland_surface", 6, "VK_USE_PLATFORM_WAYLAND_KHR")
            .extension("VK_EXT_custom_border_color", 12, true)
            .extension("VK_KHR_display", 23, false);
        let policy = VersionPolicy::up_to(ApiVersion::new(1, 0, 0));
        Resolver::new(&registry(), &policy).resolve(&declaration).unwrap()
    }

    fn generator(table: &ExtensionTable) -> CGenerator<'_> {
        CGenerator::new(table, "panvk").platform_guards(registry().platform_guards().map(str::to_string))
    }

    #[test]
    fn test_header_layout() {
        let table = table();
        let header = generator(&table).generate_header();

        assert!(header.starts_with(BANNER));
        assert!(header.contains("#ifndef PANVK_EXTENSIONS_H\n#define PANVK_EXTENSIONS_H\n"));
        assert!(header.contains("#define PANVK_MAX_API_VERSION VK_MAKE_VERSION(1, 0, 0)\n"));
        assert!(header.contains("#define PANVK_INSTANCE_EXTENSION_COUNT 3\n"));
        assert!(header.contains("#define PANVK_DEVICE_EXTENSION_COUNT 2\n"));
        assert!(header.contains(
            "struct panvk_instance_extension_table {\n   union {\n      bool extensions[PANVK_INSTANCE_EXTENSION_COUNT];\n      struct {\n         bool KHR_surface;\n         bool KHR_wayland_surface;\n         bool KHR_display;\n      };\n   };\n};\n"
        ));
        assert!(header.contains("extern const VkExtensionProperties panvk_device_extensions[PANVK_DEVICE_EXTENSION_COUNT];"));
        assert!(header.contains("extern const struct panvk_instance_extension_table panvk_supported_instance_extensions;"));
        assert!(header.contains("uint32_t panvk_physical_device_api_version(const struct panvk_physical_device *device);"));
        assert!(header.contains("void panvk_fill_device_extension_table("));
        assert!(header.ends_with("#endif /* PANVK_EXTENSIONS_H */\n"));
    }

    #[test]
    fn test_source_preserves_order_and_split() {
        let table = table();
        let source = generator(&table).generate_source();

        let instance = "const VkExtensionProperties panvk_instance_extensions[PANVK_INSTANCE_EXTENSION_COUNT] = {\n   {\"VK_KHR_surface\", 25},\n   {\"VK_KHR_wayland_surface\", 6},\n   {\"VK_KHR_display\", 23},\n};\n";
        let device = "const VkExtensionProperties panvk_device_extensions[PANVK_DEVICE_EXTENSION_COUNT] = {\n   {\"VK_KHR_swapchain\", 68},\n   {\"VK_EXT_custom_border_color\", 12},\n};\n";
        assert!(source.contains(instance));
        assert!(source.contains(device));

        let supported = "const struct panvk_instance_extension_table panvk_supported_instance_extensions = {\n   .KHR_surface = PANVK_HAS_SURFACE,\n   .KHR_wayland_surface = VK_USE_PLATFORM_WAYLAND_KHR,\n   .KHR_display = false,\n};\n";
        assert!(source.contains(supported));

        let fill = "   *extensions = (struct panvk_device_extension_table) {\n      .KHR_swapchain = PANVK_HAS_SURFACE,\n      .EXT_custom_border_color = true,\n   };\n";
        assert!(source.contains(fill));
    }

    #[test]
    fn test_flag_normalization() {
        let table = table();
        let source = generator(&table).generate_source();

        assert!(source.contains(
            "#ifdef VK_USE_PLATFORM_WAYLAND_KHR\n#   undef VK_USE_PLATFORM_WAYLAND_KHR\n#   define VK_USE_PLATFORM_WAYLAND_KHR true\n#else\n#   define VK_USE_PLATFORM_WAYLAND_KHR false\n#endif\n"
        ));
        assert!(source.contains("#ifndef PANVK_HAS_SURFACE\n#   define PANVK_HAS_SURFACE false\n#endif\n"));
        assert!(!source.contains("#ifndef VK_USE_PLATFORM_WAYLAND_KHR"));
        assert_eq!(source.matches("#ifndef PANVK_HAS_SURFACE").count(), 1);
    }

    #[test]
    fn test_api_version_function() {
        let table = table();
        let source = generator(&table).generate_source();
        let expected = "uint32_t\npanvk_physical_device_api_version(const struct panvk_physical_device *device)\n{\n   uint32_t version = 0;\n\n   (void)device;\n\n   if (!(true))\n      return version;\n   version = VK_MAKE_VERSION(1, 0, 0);\n\n   return version;\n}\n";
        assert!(source.contains(expected));
    }

    #[test]
    fn test_versions_walk_in_order() {
        let policy = VersionPolicy::new(ApiVersion::new(1, 1, 0))
            .promote(ApiVersion::new(1, 0, 0))
            .promote_if(ApiVersion::new(1, 1, 0), "DRV_HAS_11");
        let table = Resolver::new(&registry(), &policy)
            .resolve(&DriverDeclaration::new())
            .unwrap();
        let source = CGenerator::new(&table, "drv").generate_source();

        let first = source.find("version = VK_MAKE_VERSION(1, 0, 0);").unwrap();
        let gate = source.find("if (!(DRV_HAS_11))").unwrap();
        let second = source.find("version = VK_MAKE_VERSION(1, 1, 0);").unwrap();
        assert!(first < gate && gate < second);
        assert!(source.contains("#ifndef DRV_HAS_11\n"));
    }

    #[test]
    fn test_empty_tables_emit_no_arrays() {
        let policy = VersionPolicy::up_to(ApiVersion::new(1, 0, 0));
        let table = Resolver::new(&registry(), &policy)
            .resolve(&DriverDeclaration::new())
            .unwrap();
        let sources = CGenerator::new(&table, "drv").generate();

        assert!(sources.header.contains("#define DRV_INSTANCE_EXTENSION_COUNT 0\n"));
        assert!(sources.header.contains("#define DRV_DEVICE_EXTENSION_COUNT 0\n"));
        assert!(!sources.header.contains("VkExtensionProperties"));
        assert!(!sources.source.contains("VkExtensionProperties"));
        assert!(!sources.source.contains("fill_device_extension_table"));
        assert!(sources.source.contains("drv_physical_device_api_version"));
    }

    #[test]
    fn test_android_guard_normalised() {
        let declaration = DriverDeclaration::new().entry(
            DeclaredExtension::new("VK_ANDROID_private", 1, "ANDROID").synthetic(ExtensionKind::Device),
        );
        let policy = VersionPolicy::up_to(ApiVersion::new(1, 0, 0));
        let table = Resolver::new(&registry(), &policy).resolve(&declaration).unwrap();
        let source = CGenerator::new(&table, "drv").generate_source();
        assert!(source.contains("#ifdef ANDROID\n#   undef ANDROID\n"));
    }

    #[test]
    fn test_includes_and_header_name() {
        let table = table();
        let source = CGenerator::new(&table, "panvk")
            .header_name("panvk_ext.h")
            .include("panvk_private.h")
            .generate_source();
        assert!(source.contains("#include \"panvk_ext.h\"\n#include \"panvk_private.h\"\n"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let a = generator(&table()).generate();
        let b = generator(&table()).generate();
        assert_eq!(a, b);
    }
}

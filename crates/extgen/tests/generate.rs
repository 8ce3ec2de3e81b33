use extgen::build::{generate, run, GenerateRequest, OutputPaths};
use extgen::{BuildError, ResolveError};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn panvk_request() -> GenerateRequest {
    GenerateRequest::new(&[fixture("vk_subset.xml")], fixture("panvk.toml"))
}

fn write_declaration(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("decl.toml");
    fs::write(&path, text).unwrap();
    path
}

fn output_paths(dir: &Path) -> OutputPaths {
    OutputPaths {
        header: dir.join("drv_extensions.h"),
        source: dir.join("drv_extensions.c"),
        manifest: Some(dir.join("drv_extensions.json")),
    }
}

const PANVK_HEADER: &str = "/* Generated by extgen. Do not edit. */

#ifndef PANVK_EXTENSIONS_H
#define PANVK_EXTENSIONS_H

#include <stdbool.h>
#include <stdint.h>
#include <vulkan/vulkan_core.h>

#define PANVK_MAX_API_VERSION VK_MAKE_VERSION(1, 0, 0)

#define PANVK_INSTANCE_EXTENSION_COUNT 2

extern const VkExtensionProperties panvk_instance_extensions[PANVK_INSTANCE_EXTENSION_COUNT];

struct panvk_instance_extension_table {
   union {
      bool extensions[PANVK_INSTANCE_EXTENSION_COUNT];
      struct {
         bool KHR_surface;
         bool KHR_wayland_surface;
      };
   };
};

extern const struct panvk_instance_extension_table panvk_supported_instance_extensions;

#define PANVK_DEVICE_EXTENSION_COUNT 2

extern const VkExtensionProperties panvk_device_extensions[PANVK_DEVICE_EXTENSION_COUNT];

struct panvk_device_extension_table {
   union {
      bool extensions[PANVK_DEVICE_EXTENSION_COUNT];
      struct {
         bool KHR_swapchain;
         bool EXT_custom_border_color;
      };
   };
};

struct panvk_physical_device;

uint32_t panvk_physical_device_api_version(const struct panvk_physical_device *device);

void panvk_fill_device_extension_table(const struct panvk_physical_device *device,
                                       struct panvk_device_extension_table *extensions);

#endif /* PANVK_EXTENSIONS_H */
";

const PANVK_SOURCE: &str = "/* Generated by extgen. Do not edit. */

#include \"panvk_extensions.h\"

/* Convert platform guards to booleans */
#ifdef VK_USE_PLATFORM_WAYLAND_KHR
#   undef VK_USE_PLATFORM_WAYLAND_KHR
#   define VK_USE_PLATFORM_WAYLAND_KHR true
#else
#   define VK_USE_PLATFORM_WAYLAND_KHR false
#endif

#ifndef PANVK_HAS_SURFACE
#   define PANVK_HAS_SURFACE false
#endif

const VkExtensionProperties panvk_instance_extensions[PANVK_INSTANCE_EXTENSION_COUNT] = {
   {\"VK_KHR_surface\", 25},
   {\"VK_KHR_wayland_surface\", 6},
};

const struct panvk_instance_extension_table panvk_supported_instance_extensions = {
   .KHR_surface = PANVK_HAS_SURFACE,
   .KHR_wayland_surface = VK_USE_PLATFORM_WAYLAND_KHR,
};

uint32_t
panvk_physical_device_api_version(const struct panvk_physical_device *device)
{
   uint32_t version = 0;

   (void)device;

   if (!(true))
      return version;
   version = VK_MAKE_VERSION(1, 0, 0);

   return version;
}

const VkExtensionProperties panvk_device_extensions[PANVK_DEVICE_EXTENSION_COUNT] = {
   {\"VK_KHR_swapchain\", 68},
   {\"VK_EXT_custom_border_color\", 12},
};

void
panvk_fill_device_extension_table(const struct panvk_physical_device *device,
                                  struct panvk_device_extension_table *extensions)
{
   (void)device;

   *extensions = (struct panvk_device_extension_table) {
      .KHR_swapchain = PANVK_HAS_SURFACE,
      .EXT_custom_border_color = true,
   };
}
";

#[test]
fn test_panvk_header() {
    let sources = generate(&panvk_request()).unwrap();
    assert_eq!(sources.header, PANVK_HEADER);
}

#[test]
fn test_panvk_source() {
    let sources = generate(&panvk_request()).unwrap();
    assert_eq!(sources.source, PANVK_SOURCE);
    assert_eq!(sources.manifest, None);
}

#[test]
fn test_os_owned_presentation_disables_not_omits() {
    let sources = generate(&panvk_request().os_owned_presentation(true)).unwrap();

    assert!(sources.header.contains("#define PANVK_INSTANCE_EXTENSION_COUNT 2\n"));
    assert!(sources.header.contains("#define PANVK_DEVICE_EXTENSION_COUNT 2\n"));
    assert!(sources.source.contains("{\"VK_KHR_surface\", 25},"));
    assert!(sources.source.contains("   .KHR_surface = false,\n"));
    assert!(sources.source.contains("   .KHR_wayland_surface = false,\n"));
    assert!(sources.source.contains("      .KHR_swapchain = false,\n"));
    assert!(sources.source.contains("      .EXT_custom_border_color = true,\n"));
    assert!(!sources.source.contains("PANVK_HAS_SURFACE"));
}

#[test]
fn test_suppress_single_platform() {
    let sources = generate(&panvk_request().suppress_platform("wayland")).unwrap();
    assert!(sources.source.contains("   .KHR_surface = PANVK_HAS_SURFACE,\n"));
    assert!(sources.source.contains("   .KHR_wayland_surface = false,\n"));
}

#[test]
fn test_generation_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    let request = panvk_request().with_manifest();

    run(&request, &output_paths(&first)).unwrap();
    run(&request, &output_paths(&second)).unwrap();

    for name in ["drv_extensions.h", "drv_extensions.c", "drv_extensions.json"] {
        assert_eq!(
            fs::read(first.join(name)).unwrap(),
            fs::read(second.join(name)).unwrap()
        );
    }
}

#[test]
fn test_manifest_written() {
    let dir = tempfile::tempdir().unwrap();
    let paths = output_paths(dir.path());
    run(&panvk_request().with_manifest(), &paths).unwrap();

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(paths.manifest.unwrap()).unwrap()).unwrap();
    let names: Vec<&str> = manifest["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "VK_VERSION_1_0",
            "VK_KHR_surface",
            "VK_KHR_swapchain",
            "VK_KHR_wayland_surface",
            "VK_EXT_custom_border_color",
        ]
    );
}

#[test]
fn test_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let decl = write_declaration(
        dir.path(),
        r#"
driver = "drv"
max_api_version = "1.0"

[[extension]]
name = "VK_EXT_custom_border_color"
spec_version = 12
enable = true

[[extension]]
name = "VK_KHR_maintenance4"
spec_version = 2
enable = true
"#,
    );
    let out = dir.path().join("out");
    let paths = output_paths(&out);

    let err = run(&GenerateRequest::new(&[fixture("vk_subset.xml")], &decl), &paths).unwrap_err();
    assert_eq!(err.kind(), "ExtensionUnreachable");
    assert!(matches!(
        err,
        BuildError::Resolve(ResolveError::ExtensionUnreachable { ref name, .. }) if name == "VK_KHR_maintenance4"
    ));
    assert!(!paths.header.exists());
    assert!(!paths.source.exists());
    assert!(!out.exists());
}

#[test]
fn test_failure_keeps_previous_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let paths = output_paths(dir.path());
    fs::write(&paths.header, "previous header").unwrap();
    fs::write(&paths.source, "previous source").unwrap();

    let decl = write_declaration(
        dir.path(),
        "max_api_version = \"1.0\"\n\n[[extension]]\nname = \"VK_EXT_made_up\"\nspec_version = 1\n",
    );
    let err = run(&GenerateRequest::new(&[fixture("vk_subset.xml")], &decl), &paths).unwrap_err();

    assert_eq!(err.kind(), "UnknownExtension");
    assert_eq!(fs::read_to_string(&paths.header).unwrap(), "previous header");
    assert_eq!(fs::read_to_string(&paths.source).unwrap(), "previous source");
}

#[test]
fn test_spec_version_too_new() {
    let dir = tempfile::tempdir().unwrap();
    let decl = write_declaration(
        dir.path(),
        "max_api_version = \"1.0\"\n\n[[extension]]\nname = \"VK_EXT_custom_border_color\"\nspec_version = 13\n",
    );
    let err = generate(&GenerateRequest::new(&[fixture("vk_subset.xml")], &decl)).unwrap_err();
    assert_eq!(err.kind(), "SpecVersionTooNew");
    assert!(err.to_string().contains("VK_EXT_custom_border_color"));
}

#[test]
fn test_max_api_version_override() {
    let dir = tempfile::tempdir().unwrap();
    let decl = write_declaration(
        dir.path(),
        "driver = \"drv\"\nmax_api_version = \"1.0\"\n\n[[extension]]\nname = \"VK_KHR_maintenance4\"\nspec_version = 2\n",
    );
    let request = GenerateRequest::new(&[fixture("vk_subset.xml")], &decl).max_api_version("1.1");
    let sources = generate(&request).unwrap();

    assert!(sources.header.contains("#define DRV_MAX_API_VERSION VK_MAKE_VERSION(1, 1, 0)\n"));
    assert!(sources.source.contains("   version = VK_MAKE_VERSION(1, 1, 0);\n"));
    assert!(sources.source.contains("{\"VK_KHR_maintenance4\", 2},"));
}

#[test]
fn test_prefix_override() {
    let sources = generate(&panvk_request().prefix("panvk_v7")).unwrap();
    assert!(sources.header.contains("#define PANVK_V7_DEVICE_EXTENSION_COUNT 2\n"));
    assert!(sources.source.contains("#include \"panvk_v7_extensions.h\"\n"));
}

#[test]
fn test_merged_registries() {
    let dir = tempfile::tempdir().unwrap();
    let decl = write_declaration(
        dir.path(),
        r#"
driver = "drv"
max_api_version = "1.0"

[[extension]]
name = "VK_KHR_surface"
spec_version = 25

[[extension]]
name = "VK_MESA_private_pipeline"
spec_version = 1
"#,
    );
    let request = GenerateRequest::new(&[fixture("vk_subset.xml"), fixture("vk_private.xml")], &decl);
    let sources = generate(&request).unwrap();
    assert!(sources.source.contains("{\"VK_MESA_private_pipeline\", 1},"));

    let duplicate = GenerateRequest::new(&[fixture("vk_subset.xml"), fixture("vk_subset.xml")], &decl);
    assert_eq!(generate(&duplicate).unwrap_err().kind(), "RegistryError");
}

#[test]
fn test_synthetic_extension() {
    let dir = tempfile::tempdir().unwrap();
    let decl = write_declaration(
        dir.path(),
        r#"
driver = "drv"
max_api_version = "1.0"

[[extension]]
name = "VK_MESA_driver_private"
spec_version = 3
enable = "DRV_HAS_PRIVATE"
synthetic = true
kind = "instance"
"#,
    );
    let sources = generate(&GenerateRequest::new(&[fixture("vk_subset.xml")], &decl)).unwrap();
    assert!(sources.header.contains("         bool MESA_driver_private;\n"));
    assert!(sources.source.contains("   .MESA_driver_private = DRV_HAS_PRIVATE,\n"));
    assert!(sources.header.contains("#define DRV_DEVICE_EXTENSION_COUNT 0\n"));
}

#[test]
fn test_os_owned_presentation_keeps_platform_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let decl = write_declaration(
        dir.path(),
        r#"
driver = "drv"
max_api_version = "1.0"

[[extension]]
name = "VK_KHR_android_surface"
spec_version = 6
enable = "VK_USE_PLATFORM_ANDROID_KHR"

[[extension]]
name = "VK_KHR_surface"
spec_version = 25

[[extension]]
name = "VK_ANDROID_external_memory_android_hardware_buffer"
spec_version = 5
enable = "VK_USE_PLATFORM_ANDROID_KHR"
"#,
    );
    let request = GenerateRequest::new(&[fixture("vk_subset.xml")], &decl).os_owned_presentation(true);
    let sources = generate(&request).unwrap();

    assert!(sources.source.contains("   .KHR_android_surface = false,\n"));
    assert!(sources.source.contains("   .KHR_surface = false,\n"));
    assert!(sources
        .source
        .contains("      .ANDROID_external_memory_android_hardware_buffer = VK_USE_PLATFORM_ANDROID_KHR,\n"));
}

#[test]
fn test_synthetic_name_must_be_vk_identifier() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["VK_MESA_bad-name\\\"x", "MESA_driver_private"] {
        let decl = write_declaration(
            dir.path(),
            &format!(
                "max_api_version = \"1.0\"\n\n[[extension]]\nname = \"{}\"\nspec_version = 1\nsynthetic = true\n",
                name
            ),
        );
        let err = generate(&GenerateRequest::new(&[fixture("vk_subset.xml")], &decl)).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }
}

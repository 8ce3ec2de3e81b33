//! Input loaders: the registry XML and driver declaration files

pub mod config;
pub mod vk_xml;

pub use self::config::{is_c_identifier, ConfigError, DeclarationFile};
pub use self::vk_xml::{RegistryLoader, DEFAULT_API};

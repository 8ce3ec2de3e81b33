//! Resolution of declarations into extension tables

pub mod resolver;
pub mod suppression;

pub use resolver::{resolve, DependencyPolicy, ResolveError, Resolver};
pub use suppression::{PlatformSuppression, WSI_TAG};

//! Intermediate representation for extension tables
//!
//! Registry records describe what the specification knows, declarations
//! describe what the driver claims, and the table is what the resolver
//! produces from both.

pub mod declaration;
pub mod depends;
pub mod registry;
pub mod table;
pub mod version;

pub use declaration::*;
pub use depends::*;
pub use registry::*;
pub use table::*;
pub use version::*;

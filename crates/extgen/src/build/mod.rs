//! Generation pipeline and build-script integration
//!
//! - `generate`/`run` for one-shot generation from files on disk
//! - `TableBuilder` for build.rs scripts writing into `OUT_DIR`

pub mod builder;
pub mod pipeline;

pub use builder::TableBuilder;
pub use pipeline::{generate, run, write_outputs, BuildError, GenerateRequest, OutputPaths};

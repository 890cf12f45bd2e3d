//! Configuration loading for pipegraph.
//!
//! This crate handles:
//! - Pipeline definitions (pipeline.kdl)
//! - Build and deploy script documents (build.yaml, deploy.yaml)

pub mod definition;
pub mod error;
pub mod scripts;

pub use definition::{PipelineDefinition, parse_definition};
pub use error::{ConfigError, ConfigResult};
pub use scripts::DirectoryScriptLoader;

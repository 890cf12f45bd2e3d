//! Core domain types and graph builder for pipegraph delivery pipelines.
//!
//! This crate contains:
//! - Identifiers and opaque handles (deploy targets, secrets, topics, artifacts)
//! - Input descriptors (source, approval policy, deployment stages)
//! - The output pipeline graph (stages, actions, build projects)
//! - The build script loader abstraction
//! - The pipeline graph builder
//! - Provider template rendering

pub mod approval;
pub mod builder;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod id;
pub mod script;
pub mod template;

pub use approval::ApprovalPolicy;
pub use builder::PipelineGraphBuilder;
pub use descriptor::{PipelineIdentity, SourceDescriptor, StageDescriptor};
pub use error::{Error, Result};
pub use graph::{Action, PipelineGraph, Stage};
pub use id::{ArtifactToken, DeployTarget, SecretRef, TopicRef};
pub use script::{BuildScriptPayload, ScriptKind, ScriptLoader, StaticScripts};

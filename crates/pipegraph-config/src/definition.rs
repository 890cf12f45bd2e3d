//! Pipeline definition parsing.

use kdl::{KdlDocument, KdlNode};
use pipegraph_core::descriptor::{DEFAULT_BRANCH, DEFAULT_PIPELINE_NAME};
use pipegraph_core::{
    ApprovalPolicy, PipelineGraph, PipelineGraphBuilder, PipelineIdentity, ScriptLoader,
    SourceDescriptor, StageDescriptor, TopicRef,
};
use std::path::Path;
use tracing::{debug, warn};

use crate::{ConfigError, ConfigResult};

/// Everything needed to build a pipeline graph, as read from a definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    pub identity: PipelineIdentity,
    pub source: SourceDescriptor,
    /// Approval policy of the self-deploy stage.
    pub approval: ApprovalPolicy,
    /// Deployment stages in deployment order.
    pub stages: Vec<StageDescriptor>,
}

impl PipelineDefinition {
    /// Read and parse a definition file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading pipeline definition");
        let content = std::fs::read_to_string(path)?;
        parse_definition(&content)
    }

    /// Build the pipeline graph for this definition.
    pub fn build_graph<L: ScriptLoader>(&self, loader: L) -> ConfigResult<PipelineGraph> {
        let builder = PipelineGraphBuilder::new(self.identity.clone(), loader);
        Ok(builder.build(&self.source, &self.approval, &self.stages)?)
    }
}

/// Parse a pipeline definition from KDL text.
pub fn parse_definition(kdl: &str) -> ConfigResult<PipelineDefinition> {
    let doc: KdlDocument = kdl.parse()?;

    let mut identity = None;
    let mut source = None;
    let mut approval = None;
    let mut stages = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "pipeline" => {
                if identity.is_some() {
                    return Err(ConfigError::Duplicate("pipeline".to_string()));
                }
                identity = Some(parse_identity(node)?);
            }
            "source" => {
                if source.is_some() {
                    return Err(ConfigError::Duplicate("source".to_string()));
                }
                source = Some(parse_source(node)?);
            }
            "approval" => {
                if approval.is_some() {
                    return Err(ConfigError::Duplicate("approval".to_string()));
                }
                approval = Some(parse_approval(node)?);
            }
            "stage" => {
                stages.push(parse_stage(node)?);
            }
            other => warn!(node = other, "Ignoring unknown definition node"),
        }
    }

    let identity = identity.ok_or_else(|| ConfigError::MissingField("pipeline".to_string()))?;
    let source = source.ok_or_else(|| ConfigError::MissingField("source".to_string()))?;

    Ok(PipelineDefinition {
        identity,
        source,
        approval: approval.unwrap_or_default(),
        stages,
    })
}

fn parse_identity(node: &KdlNode) -> ConfigResult<PipelineIdentity> {
    let name = get_first_string_arg(node).unwrap_or_else(|| DEFAULT_PIPELINE_NAME.to_string());
    let target = require_string_prop(node, "target", "pipeline target")?;
    Ok(PipelineIdentity::new(name, target))
}

fn parse_source(node: &KdlNode) -> ConfigResult<SourceDescriptor> {
    let owner = require_string_prop(node, "owner", "source owner")?;
    let repository = require_string_prop(node, "repository", "source repository")?;
    let token = require_string_prop(node, "oauth-token", "source oauth-token")?;
    let branch = get_string_prop(node, "branch").unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    Ok(SourceDescriptor::new(owner, repository, token).with_branch(branch))
}

fn parse_stage(node: &KdlNode) -> ConfigResult<StageDescriptor> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("stage name".to_string()))?;
    let target = require_string_prop(node, "target", &format!("target for stage '{}'", name))?;

    let mut approval = None;
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "approval" => {
                    if approval.is_some() {
                        return Err(ConfigError::Duplicate(format!(
                            "approval in stage '{}'",
                            name
                        )));
                    }
                    approval = Some(parse_approval(child)?);
                }
                other => warn!(stage = %name, node = other, "Ignoring unknown stage node"),
            }
        }
    }

    Ok(StageDescriptor::new(name, target).with_approval(approval.unwrap_or_default()))
}

/// `approval` enables a gate; `approval #false` disables it explicitly.
fn parse_approval(node: &KdlNode) -> ConfigResult<ApprovalPolicy> {
    if let Some(entry) = node.entries().iter().find(|e| e.name().is_none()) {
        match entry.value().as_bool() {
            Some(false) => return Ok(ApprovalPolicy::Disabled),
            Some(true) => {}
            None => {
                return Err(ConfigError::InvalidValue {
                    field: "approval".to_string(),
                    message: "expected #true or #false".to_string(),
                });
            }
        }
    }

    Ok(ApprovalPolicy::Enabled {
        email: get_string_prop(node, "email"),
        topic: get_string_prop(node, "topic").map(TopicRef::new),
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn require_string_prop(node: &KdlNode, name: &str, field: &str) -> ConfigResult<String> {
    match node.get(name) {
        None => Err(ConfigError::MissingField(field.to_string())),
        Some(value) => match value.as_string() {
            Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
            Some(_) => Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "must not be empty".to_string(),
            }),
            None => Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "expected a string".to_string(),
            }),
        },
    }
}

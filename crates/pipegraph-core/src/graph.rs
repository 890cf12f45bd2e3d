//! The pipeline graph: ordered stages of ordered actions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::script::BuildScriptPayload;
use crate::{ArtifactToken, DeployTarget, SecretRef, TopicRef};

/// Managed policy attached to deploy project roles.
pub const ADMINISTRATOR_ACCESS: &str = "AdministratorAccess";

/// Environment variable carrying the deploy target into deploy scripts.
pub const TARGET_ENV_VAR: &str = "STACK_NAME";

/// A complete pipeline definition, ready for the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineGraph {
    /// Pipeline name.
    pub name: String,
    /// Artifact tokens passed between actions, in production order.
    pub artifacts: Vec<ArtifactToken>,
    /// Stages in execution order.
    pub stages: Vec<Stage>,
}

impl PipelineGraph {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// All build projects referenced by build and deploy actions.
    pub fn projects(&self) -> impl Iterator<Item = &BuildProject> {
        self.stages
            .iter()
            .flat_map(|s| s.actions.iter())
            .filter_map(|a| match a {
                Action::Build(build) => Some(&build.project),
                _ => None,
            })
    }
}

/// A named group of actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub actions: Vec<Action>,
}

/// A single unit of work within a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Watches the repository and emits the source artifact.
    Source(SourceAction),
    /// Runs a build project, either the build or a deploy.
    Build(BuildAction),
    /// Pauses the stage until someone approves.
    Approval(ApprovalAction),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Source(a) => &a.name,
            Action::Build(a) => &a.name,
            Action::Approval(a) => &a.name,
        }
    }

    pub fn run_order(&self) -> u32 {
        match self {
            Action::Source(a) => a.run_order,
            Action::Build(a) => a.run_order,
            Action::Approval(a) => a.run_order,
        }
    }

    pub fn is_deploy(&self) -> bool {
        matches!(self, Action::Build(a) if a.is_deploy())
    }

    pub fn is_approval(&self) -> bool {
        matches!(self, Action::Approval(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAction {
    pub name: String,
    pub owner: String,
    pub repository: String,
    pub branch: String,
    /// Reference to the repository access token.
    pub credential: SecretRef,
    pub output: ArtifactToken,
    pub run_order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildAction {
    pub name: String,
    pub project: BuildProject,
    pub input: ArtifactToken,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ArtifactToken>,
    pub run_order: u32,
}

impl BuildAction {
    pub fn is_deploy(&self) -> bool {
        matches!(self.project.flavor, BuildFlavor::Deploy { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify_emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_topic: Option<TopicRef>,
    pub run_order: u32,
}

/// What a build project is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum BuildFlavor {
    Build,
    Deploy { target: DeployTarget },
}

/// A build runner project: the script it runs and the environment it runs in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildProject {
    pub name: String,
    #[serde(flatten)]
    pub flavor: BuildFlavor,
    pub buildspec: BuildScriptPayload,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Managed policies attached to the project's execution role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policies: Vec<String>,
}

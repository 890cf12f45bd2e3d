//! Input descriptors for pipeline graph construction.

use serde::{Deserialize, Serialize};

use crate::{ApprovalPolicy, DeployTarget, SecretRef};

/// Branch watched by the source action when none is given.
pub const DEFAULT_BRANCH: &str = "master";

/// Pipeline name used when none is given.
pub const DEFAULT_PIPELINE_NAME: &str = "DeploymentPipeline";

/// Where pipeline-triggering commits come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Credential store reference for the repository access token.
    pub credential: SecretRef,
    /// Branch whose commits trigger the pipeline.
    pub branch: String,
}

impl SourceDescriptor {
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        credential: impl Into<SecretRef>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            credential: credential.into(),
            branch: DEFAULT_BRANCH.to_string(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }
}

/// One deployment environment (Beta, Prod, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Display name; stage and action names are derived from it.
    pub name: String,
    /// The deployable unit this stage deploys.
    pub target: DeployTarget,
    /// Approval gate appended after the deploy action.
    #[serde(default)]
    pub approval: ApprovalPolicy,
}

impl StageDescriptor {
    pub fn new(name: impl Into<String>, target: impl Into<DeployTarget>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            approval: ApprovalPolicy::Disabled,
        }
    }

    pub fn with_approval(mut self, approval: ApprovalPolicy) -> Self {
        self.approval = approval;
        self
    }
}

/// The pipeline itself: its name and the deploy target holding its own
/// definition, which the self-deploy stage updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineIdentity {
    pub name: String,
    pub target: DeployTarget,
}

impl PipelineIdentity {
    pub fn new(name: impl Into<String>, target: impl Into<DeployTarget>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Identity with the default pipeline name.
    pub fn for_target(target: impl Into<DeployTarget>) -> Self {
        Self::new(DEFAULT_PIPELINE_NAME, target)
    }
}

//! Pipeline graph construction.
//!
//! The graph is always laid out as:
//!
//! ```text
//! SourceStage -> BuildStage -> DeployPipelineStage -> Deploy{Stage}Stage ...
//! ```
//!
//! Deployment stages appear in exactly the order they were supplied. Every
//! deploy stage holds one deploy action, followed by an approval action when
//! its policy is enabled.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::graph::{
    ADMINISTRATOR_ACCESS, Action, ApprovalAction, BuildAction, BuildFlavor, BuildProject,
    SourceAction, Stage, TARGET_ENV_VAR,
};
use crate::script::{BuildScriptPayload, ScriptKind, ScriptLoader};
use crate::{
    ApprovalPolicy, ArtifactToken, DeployTarget, Error, PipelineGraph, PipelineIdentity, Result,
    SourceDescriptor, StageDescriptor,
};

/// Name of the artifact produced by the source action.
pub const SOURCE_ARTIFACT: &str = "Source";

/// Name of the artifact produced by the build action.
pub const BUILD_ARTIFACT: &str = "Builds";

/// Name fragment used for the self-deploy stage and its actions.
const SELF_STAGE_FRAGMENT: &str = "Pipeline";

/// Stage names accepted by the execution service.
static STAGE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.@_-]+$").expect("Invalid regex"));

/// Builds pipeline graphs for one pipeline.
pub struct PipelineGraphBuilder<L> {
    identity: PipelineIdentity,
    loader: L,
}

/// Script documents loaded for a single build.
struct Scripts {
    build: BuildScriptPayload,
    deploy: BuildScriptPayload,
}

impl<L: ScriptLoader> PipelineGraphBuilder<L> {
    pub fn new(identity: PipelineIdentity, loader: L) -> Self {
        Self { identity, loader }
    }

    pub fn identity(&self) -> &PipelineIdentity {
        &self.identity
    }

    /// Build the graph for a source, the self-deploy approval policy and the
    /// deployment stages in order.
    ///
    /// Inputs are validated and both script documents loaded before any stage
    /// is composed, so a failure never yields a partial graph.
    pub fn build(
        &self,
        source: &SourceDescriptor,
        approval: &ApprovalPolicy,
        stages: &[StageDescriptor],
    ) -> Result<PipelineGraph> {
        self.validate(source, stages)?;
        let scripts = self.load_scripts()?;

        let source_artifact = ArtifactToken::new(SOURCE_ARTIFACT);
        let build_artifact = ArtifactToken::new(BUILD_ARTIFACT);

        let mut graph_stages = Vec::with_capacity(3 + stages.len());

        graph_stages.push(Stage {
            name: "SourceStage".to_string(),
            actions: vec![Action::Source(SourceAction {
                name: "SourceAction".to_string(),
                owner: source.owner.clone(),
                repository: source.repository.clone(),
                branch: source.branch.clone(),
                credential: source.credential.clone(),
                output: source_artifact.clone(),
                run_order: 1,
            })],
        });

        graph_stages.push(Stage {
            name: "BuildStage".to_string(),
            actions: vec![Action::Build(BuildAction {
                name: "BuildAction".to_string(),
                project: BuildProject {
                    name: "Build".to_string(),
                    flavor: BuildFlavor::Build,
                    buildspec: scripts.build.clone(),
                    environment: BTreeMap::new(),
                    managed_policies: Vec::new(),
                },
                input: source_artifact.clone(),
                outputs: vec![build_artifact.clone()],
                run_order: 1,
            })],
        });

        graph_stages.push(deploy_stage(
            SELF_STAGE_FRAGMENT,
            &self.identity.target,
            approval,
            &scripts.deploy,
            &build_artifact,
        ));

        for descriptor in stages {
            debug!(stage = %descriptor.name, target = %descriptor.target, "Adding deployment stage");
            graph_stages.push(deploy_stage(
                &descriptor.name,
                &descriptor.target,
                &descriptor.approval,
                &scripts.deploy,
                &build_artifact,
            ));
        }

        info!(
            pipeline = %self.identity.name,
            stages = graph_stages.len(),
            "Built pipeline graph"
        );

        Ok(PipelineGraph {
            name: self.identity.name.clone(),
            artifacts: vec![source_artifact, build_artifact],
            stages: graph_stages,
        })
    }

    fn load_scripts(&self) -> Result<Scripts> {
        let build = self.loader.load(ScriptKind::Build)?;
        let deploy = self.loader.load(ScriptKind::Deploy)?;
        Ok(Scripts { build, deploy })
    }

    fn validate(&self, source: &SourceDescriptor, stages: &[StageDescriptor]) -> Result<()> {
        require_non_empty("pipeline name", &self.identity.name)?;
        require_target("pipeline target", &self.identity.target)?;

        require_non_empty("source owner", &source.owner)?;
        require_non_empty("source repository", &source.repository)?;
        require_non_empty("source branch", &source.branch)?;
        if source.credential.is_empty() {
            return Err(Error::InvalidInput(
                "source credential reference must not be empty".to_string(),
            ));
        }

        // Generated names must not collide, including with the self-deploy stage.
        let mut stage_names: HashMap<String, &str> = HashMap::new();
        let mut targets: HashMap<&DeployTarget, &str> = HashMap::new();
        stage_names.insert(deploy_stage_name(SELF_STAGE_FRAGMENT), SELF_STAGE_FRAGMENT);
        targets.insert(&self.identity.target, SELF_STAGE_FRAGMENT);

        for descriptor in stages {
            require_non_empty("stage name", &descriptor.name)?;
            if !STAGE_NAME_PATTERN.is_match(&descriptor.name) {
                return Err(Error::InvalidInput(format!(
                    "stage name '{}' may only contain letters, digits and . @ _ -",
                    descriptor.name
                )));
            }
            require_target(&format!("target for stage '{}'", descriptor.name), &descriptor.target)?;

            if let Some(existing) =
                stage_names.insert(deploy_stage_name(&descriptor.name), &descriptor.name)
            {
                return Err(Error::InvalidInput(format!(
                    "stage '{}' collides with stage '{}'",
                    descriptor.name, existing
                )));
            }
            if let Some(existing) = targets.insert(&descriptor.target, &descriptor.name) {
                return Err(Error::InvalidInput(format!(
                    "stage '{}' deploys target '{}' already deployed by stage '{}'",
                    descriptor.name, descriptor.target, existing
                )));
            }
        }

        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_target(field: &str, target: &DeployTarget) -> Result<()> {
    if target.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn deploy_stage_name(fragment: &str) -> String {
    format!("Deploy{}Stage", fragment)
}

fn deploy_stage(
    fragment: &str,
    target: &DeployTarget,
    approval: &ApprovalPolicy,
    deploy_script: &BuildScriptPayload,
    input: &ArtifactToken,
) -> Stage {
    let mut actions = vec![Action::Build(BuildAction {
        name: format!("Deploy{}Action", fragment),
        project: deploy_project(target, deploy_script),
        input: input.clone(),
        outputs: Vec::new(),
        run_order: 1,
    })];

    if let ApprovalPolicy::Enabled { email, topic } = approval {
        actions.push(Action::Approval(ApprovalAction {
            name: format!("Approve{}Action", fragment),
            notify_emails: email.iter().cloned().collect(),
            notification_topic: topic.clone(),
            run_order: 2,
        }));
    }

    Stage {
        name: deploy_stage_name(fragment),
        actions,
    }
}

fn deploy_project(target: &DeployTarget, deploy_script: &BuildScriptPayload) -> BuildProject {
    warn!(
        target = %target,
        policy = ADMINISTRATOR_ACCESS,
        "Deploy project role is granted administrative access"
    );

    let mut environment = BTreeMap::new();
    environment.insert(TARGET_ENV_VAR.to_string(), target.to_string());

    BuildProject {
        name: format!("Deploy{}", target),
        flavor: BuildFlavor::Deploy {
            target: target.clone(),
        },
        buildspec: deploy_script.clone(),
        environment,
        managed_policies: vec![ADMINISTRATOR_ACCESS.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticScripts;
    use serde_json::json;

    fn scripts() -> StaticScripts {
        StaticScripts::new()
            .with(
                ScriptKind::Build,
                json!({"version": 0.2, "phases": {"build": {"commands": ["npm ci", "npm run build"]}}}),
            )
            .with(
                ScriptKind::Deploy,
                json!({"version": 0.2, "phases": {"build": {"commands": ["npx cdk deploy $STACK_NAME"]}}}),
            )
    }

    fn builder() -> PipelineGraphBuilder<StaticScripts> {
        PipelineGraphBuilder::new(PipelineIdentity::for_target("MyPipeline"), scripts())
    }

    fn source() -> SourceDescriptor {
        SourceDescriptor::new("test-owner", "test-repo", "super-secret")
    }

    fn action_names(stage: &Stage) -> Vec<&str> {
        stage.actions.iter().map(|a| a.name()).collect()
    }

    #[test]
    fn test_no_stages_without_approval() {
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &[])
            .unwrap();

        assert_eq!(graph.stage_count(), 3);
        assert_eq!(graph.stages[2].actions.len(), 1);
    }

    #[test]
    fn test_no_stages_with_approval() {
        let graph = builder()
            .build(&source(), &ApprovalPolicy::email("me@test.com"), &[])
            .unwrap();

        assert_eq!(graph.stage_count(), 3);
        let stage = &graph.stages[2];
        assert_eq!(stage.actions.len(), 2);
        assert!(stage.actions[0].is_deploy());
        assert!(stage.actions[1].is_approval());

        match &stage.actions[1] {
            Action::Approval(approval) => {
                assert_eq!(approval.notify_emails, vec!["me@test.com"]);
                assert_eq!(approval.run_order, 2);
            }
            other => panic!("expected approval action, got {:?}", other),
        }
    }

    #[test]
    fn test_single_stage_without_approval() {
        let stages = [StageDescriptor::new("Beta", "MyService")];
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap();

        assert_eq!(graph.stage_count(), 4);
        assert_eq!(graph.stages[3].actions.len(), 1);
        assert_eq!(graph.stages[3].name, "DeployBetaStage");
    }

    #[test]
    fn test_single_stage_with_approval() {
        let stages = [StageDescriptor::new("Beta", "MyService")
            .with_approval(ApprovalPolicy::email("me@test.com"))];
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap();

        assert_eq!(graph.stage_count(), 4);
        assert_eq!(graph.stages[2].actions.len(), 1);
        assert_eq!(
            action_names(&graph.stages[3]),
            vec!["DeployBetaAction", "ApproveBetaAction"]
        );
        assert!(graph.stages[3].actions[0].is_deploy());
        assert!(graph.stages[3].actions[1].is_approval());
    }

    #[test]
    fn test_fixed_stage_layout() {
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &[])
            .unwrap();

        let names: Vec<&str> = graph.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SourceStage", "BuildStage", "DeployPipelineStage"]);

        match &graph.stages[0].actions[0] {
            Action::Source(action) => {
                assert_eq!(action.owner, "test-owner");
                assert_eq!(action.repository, "test-repo");
                assert_eq!(action.branch, "master");
                assert_eq!(action.credential.as_str(), "super-secret");
                assert_eq!(action.output.as_str(), SOURCE_ARTIFACT);
            }
            other => panic!("expected source action, got {:?}", other),
        }

        match &graph.stages[1].actions[0] {
            Action::Build(action) => {
                assert!(!action.is_deploy());
                assert_eq!(action.input.as_str(), SOURCE_ARTIFACT);
                assert_eq!(action.outputs, vec![ArtifactToken::new(BUILD_ARTIFACT)]);
                assert_eq!(action.project.name, "Build");
                assert!(action.project.managed_policies.is_empty());
            }
            other => panic!("expected build action, got {:?}", other),
        }
    }

    #[test]
    fn test_self_deploy_targets_pipeline() {
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &[])
            .unwrap();

        match &graph.stages[2].actions[0] {
            Action::Build(action) => {
                assert_eq!(action.name, "DeployPipelineAction");
                assert_eq!(action.input.as_str(), BUILD_ARTIFACT);
                assert_eq!(action.project.name, "DeployMyPipeline");
                assert_eq!(
                    action.project.environment.get(TARGET_ENV_VAR).map(String::as_str),
                    Some("MyPipeline")
                );
                assert_eq!(action.project.managed_policies, vec![ADMINISTRATOR_ACCESS]);
            }
            other => panic!("expected deploy action, got {:?}", other),
        }
    }

    #[test]
    fn test_stage_order_mirrors_input() {
        let stages = [
            StageDescriptor::new("Prod", "ServiceProd"),
            StageDescriptor::new("Beta", "ServiceBeta"),
            StageDescriptor::new("Gamma", "ServiceGamma"),
        ];
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap();

        let names: Vec<&str> = graph.stages[3..].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["DeployProdStage", "DeployBetaStage", "DeployGammaStage"]);
        assert_eq!(graph.stage_count(), 3 + stages.len());
    }

    #[test]
    fn test_deploy_script_passed_through() {
        let stages = [StageDescriptor::new("Beta", "MyService")];
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap();

        let expected = scripts().load(ScriptKind::Deploy).unwrap();
        match &graph.stages[3].actions[0] {
            Action::Build(action) => {
                assert_eq!(action.project.buildspec, expected);
                assert_eq!(
                    action.project.environment.get(TARGET_ENV_VAR).map(String::as_str),
                    Some("MyService")
                );
            }
            other => panic!("expected deploy action, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_approval_stages() {
        let stages = [
            StageDescriptor::new("Beta", "ServiceBeta")
                .with_approval(ApprovalPolicy::email("me@test.com")),
            StageDescriptor::new("Gamma", "ServiceGamma"),
            StageDescriptor::new("Prod", "ServiceProd")
                .with_approval(ApprovalPolicy::topic("approvals")),
        ];
        let graph = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap();

        assert_eq!(graph.stage_count(), 6);
        assert_eq!(graph.stages[2].actions.len(), 1);
        assert_eq!(
            action_names(&graph.stages[3]),
            vec!["DeployBetaAction", "ApproveBetaAction"]
        );
        assert_eq!(action_names(&graph.stages[4]), vec!["DeployGammaAction"]);
        assert_eq!(
            action_names(&graph.stages[5]),
            vec!["DeployProdAction", "ApproveProdAction"]
        );

        let run_orders: Vec<u32> = graph.stages[5].actions.iter().map(|a| a.run_order()).collect();
        assert_eq!(run_orders, vec![1, 2]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let stages = [
            StageDescriptor::new("Beta", "ServiceBeta")
                .with_approval(ApprovalPolicy::topic("approvals")),
            StageDescriptor::new("Prod", "ServiceProd"),
        ];
        let b = builder();
        let first = b
            .build(&source(), &ApprovalPolicy::email("me@test.com"), &stages)
            .unwrap();
        let second = b
            .build(&source(), &ApprovalPolicy::email("me@test.com"), &stages)
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_source_fields_rejected() {
        let b = builder();
        for source in [
            SourceDescriptor::new("", "repo", "token"),
            SourceDescriptor::new("owner", " ", "token"),
            SourceDescriptor::new("owner", "repo", ""),
            SourceDescriptor::new("owner", "repo", "token").with_branch(""),
        ] {
            let err = b.build(&source, &ApprovalPolicy::Disabled, &[]).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{:?}", source);
        }
    }

    #[test]
    fn test_invalid_stage_name_rejected() {
        let stages = [StageDescriptor::new("Beta stage!", "MyService")];
        let err = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_stage_names_rejected() {
        let stages = [
            StageDescriptor::new("Beta", "ServiceA"),
            StageDescriptor::new("Beta", "ServiceB"),
        ];
        let err = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn test_stage_named_pipeline_rejected() {
        let stages = [StageDescriptor::new("Pipeline", "MyService")];
        let err = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let stages = [StageDescriptor::new("Beta", "MyPipeline")];
        let err = builder()
            .build(&source(), &ApprovalPolicy::Disabled, &stages)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("MyPipeline"));
    }

    #[test]
    fn test_missing_script_is_configuration_error() {
        let loader = StaticScripts::new().with(ScriptKind::Build, json!({"version": 0.2}));
        let b = PipelineGraphBuilder::new(PipelineIdentity::for_target("MyPipeline"), loader);

        let err = b.build(&source(), &ApprovalPolicy::Disabled, &[]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_borrowed_loader() {
        let loader = scripts();
        let b = PipelineGraphBuilder::new(PipelineIdentity::for_target("MyPipeline"), &loader);
        assert!(b.build(&source(), &ApprovalPolicy::Disabled, &[]).is_ok());
    }
}

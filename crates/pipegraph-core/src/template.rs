//! Provider template rendering.
//!
//! Turns a [`PipelineGraph`] into a resource template for the managed
//! pipeline service:
//!
//! | Graph node | Template resource |
//! |------------|-------------------|
//! | pipeline | `AWS::CodePipeline::Pipeline` |
//! | build project | `AWS::CodeBuild::Project` (+ `AWS::IAM::Role` when policies are attached) |
//! | approval with email | `AWS::SNS::Topic` with email subscriptions |
//! | approval with topic and email | `AWS::SNS::Subscription` per email on that topic |
//!
//! Output keys are sorted, so rendering the same graph twice yields the same
//! document. Logical ids keep only the alphanumeric characters of a name, so
//! distinct names can map to the same id; rendering fails rather than let one
//! resource replace another.

use serde_json::{Map, Value, json};

use crate::graph::{ApprovalAction, BuildAction, BuildProject, SourceAction};
use crate::{Action, Error, PipelineGraph, Result};

const MANAGED_POLICY_PREFIX: &str = "arn:aws:iam::aws:policy/";

/// Render a graph into a resource template.
pub fn render(graph: &PipelineGraph) -> Result<Value> {
    let mut resources = Map::new();

    for project in graph.projects() {
        render_project(project, &mut resources)?;
    }

    let mut stages = Vec::with_capacity(graph.stages.len());
    for stage in &graph.stages {
        let actions = stage
            .actions
            .iter()
            .map(|action| render_action(action, &mut resources))
            .collect::<Result<Vec<_>>>()?;
        stages.push(json!({
            "Name": stage.name,
            "Actions": actions,
        }));
    }

    insert_resource(
        &mut resources,
        logical_id(&graph.name, ""),
        json!({
            "Type": "AWS::CodePipeline::Pipeline",
            "Properties": {
                "Name": graph.name,
                "Stages": stages,
            },
        }),
    )?;

    Ok(json!({ "Resources": resources }))
}

fn insert_resource(
    resources: &mut Map<String, Value>,
    id: String,
    resource: Value,
) -> Result<()> {
    if resources.contains_key(&id) {
        return Err(Error::Configuration(format!(
            "template resource id '{}' is produced by more than one graph node",
            id
        )));
    }
    resources.insert(id, resource);
    Ok(())
}

fn render_action(action: &Action, resources: &mut Map<String, Value>) -> Result<Value> {
    match action {
        Action::Source(source) => Ok(render_source(source)),
        Action::Build(build) => Ok(render_build(build)),
        Action::Approval(approval) => render_approval(approval, resources),
    }
}

fn render_source(action: &SourceAction) -> Value {
    json!({
        "Name": action.name,
        "ActionTypeId": action_type("Source", "ThirdParty", "GitHub"),
        "Configuration": {
            "Owner": action.owner,
            "Repo": action.repository,
            "Branch": action.branch,
            "OAuthToken": format!(
                "{{{{resolve:secretsmanager:{}:SecretString}}}}",
                action.credential
            ),
            "PollForSourceChanges": false,
        },
        "OutputArtifacts": [{ "Name": action.output }],
        "RunOrder": action.run_order,
    })
}

fn render_build(action: &BuildAction) -> Value {
    let mut rendered = json!({
        "Name": action.name,
        "ActionTypeId": action_type("Build", "AWS", "CodeBuild"),
        "Configuration": {
            "ProjectName": { "Ref": logical_id(&action.project.name, "Project") },
        },
        "InputArtifacts": [{ "Name": action.input }],
        "RunOrder": action.run_order,
    });

    if !action.outputs.is_empty() {
        let outputs: Vec<Value> = action
            .outputs
            .iter()
            .map(|artifact| json!({ "Name": artifact }))
            .collect();
        rendered["OutputArtifacts"] = Value::Array(outputs);
    }

    rendered
}

fn render_approval(
    action: &ApprovalAction,
    resources: &mut Map<String, Value>,
) -> Result<Value> {
    let mut configuration = Map::new();

    if let Some(topic) = &action.notification_topic {
        // Emails subscribe to the given topic.
        for (index, email) in action.notify_emails.iter().enumerate() {
            insert_resource(
                resources,
                logical_id(&action.name, &format!("Subscription{}", index)),
                json!({
                    "Type": "AWS::SNS::Subscription",
                    "Properties": {
                        "TopicArn": topic,
                        "Protocol": "email",
                        "Endpoint": email,
                    },
                }),
            )?;
        }
        configuration.insert("NotificationArn".to_string(), json!(topic));
    } else if !action.notify_emails.is_empty() {
        let topic_id = logical_id(&action.name, "Topic");
        let subscriptions: Vec<Value> = action
            .notify_emails
            .iter()
            .map(|email| json!({ "Protocol": "email", "Endpoint": email }))
            .collect();
        insert_resource(
            resources,
            topic_id.clone(),
            json!({
                "Type": "AWS::SNS::Topic",
                "Properties": { "Subscription": subscriptions },
            }),
        )?;
        configuration.insert("NotificationArn".to_string(), json!({ "Ref": topic_id }));
    }

    let mut rendered = json!({
        "Name": action.name,
        "ActionTypeId": action_type("Approval", "AWS", "Manual"),
        "RunOrder": action.run_order,
    });
    if !configuration.is_empty() {
        rendered["Configuration"] = Value::Object(configuration);
    }
    Ok(rendered)
}

fn render_project(project: &BuildProject, resources: &mut Map<String, Value>) -> Result<()> {
    let project_id = logical_id(&project.name, "Project");
    let role_id = logical_id(&project.name, "Role");

    // Inlined so the build service does not resolve it against the input artifact.
    let buildspec = serde_json::to_string(project.buildspec.as_map()).map_err(|e| {
        Error::Configuration(format!(
            "buildspec for project '{}' cannot be serialized: {}",
            project.name, e
        ))
    })?;

    let variables: Vec<Value> = project
        .environment
        .iter()
        .map(|(name, value)| json!({ "Name": name, "Type": "PLAINTEXT", "Value": value }))
        .collect();

    let policies: Vec<String> = project
        .managed_policies
        .iter()
        .map(|policy| format!("{}{}", MANAGED_POLICY_PREFIX, policy))
        .collect();

    insert_resource(
        resources,
        role_id.clone(),
        json!({
            "Type": "AWS::IAM::Role",
            "Properties": {
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": "codebuild.amazonaws.com" },
                    }],
                },
                "ManagedPolicyArns": policies,
            },
        }),
    )?;

    insert_resource(
        resources,
        project_id,
        json!({
            "Type": "AWS::CodeBuild::Project",
            "Properties": {
                "Name": project.name,
                "Artifacts": { "Type": "CODEPIPELINE" },
                "Source": { "Type": "CODEPIPELINE", "BuildSpec": buildspec },
                "Environment": {
                    "Type": "LINUX_CONTAINER",
                    "ComputeType": "BUILD_GENERAL1_SMALL",
                    "Image": "aws/codebuild/standard:5.0",
                    "EnvironmentVariables": variables,
                },
                "ServiceRole": { "Fn::GetAtt": [role_id, "Arn"] },
            },
        }),
    )?;

    Ok(())
}

fn action_type(category: &str, owner: &str, provider: &str) -> Value {
    json!({
        "Category": category,
        "Owner": owner,
        "Provider": provider,
        "Version": "1",
    })
}

/// Template logical ids are alphanumeric only.
fn logical_id(name: &str, suffix: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .chain(suffix.chars())
        .collect()
}

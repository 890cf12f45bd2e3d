//! CLI command implementations.

use anyhow::{Context, Result};
use pipegraph_config::{DirectoryScriptLoader, PipelineDefinition};
use pipegraph_core::{Action, PipelineGraph, template};
use std::path::Path;
use tracing::info;

use crate::OutputFormat;

fn build(definition: &Path, scripts: &Path) -> Result<PipelineGraph> {
    let definition = PipelineDefinition::load(definition)
        .with_context(|| format!("failed to load {}", definition.display()))?;
    let graph = definition.build_graph(DirectoryScriptLoader::new(scripts))?;
    Ok(graph)
}

pub fn synth(definition: &Path, scripts: &Path, format: OutputFormat) -> Result<()> {
    let graph = build(definition, scripts)?;

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&graph)?,
        OutputFormat::Yaml => serde_yaml::to_string(&graph)?,
        OutputFormat::Template => serde_json::to_string_pretty(&template::render(&graph)?)?,
    };
    println!("{}", rendered);
    Ok(())
}

pub fn validate(definition: &Path, scripts: &Path) -> Result<()> {
    match build(definition, scripts) {
        Ok(graph) => {
            info!(pipeline = %graph.name, stages = graph.stage_count(), "Definition is valid");
            println!("Configuration is valid");
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

pub fn stages(definition: &Path, scripts: &Path) -> Result<()> {
    let graph = build(definition, scripts)?;

    println!("{}", graph.name);
    for (index, stage) in graph.stages.iter().enumerate() {
        println!("{:>3}. {}", index + 1, stage.name);
        for action in &stage.actions {
            let kind = match action {
                Action::Source(_) => "source",
                Action::Build(build) if build.is_deploy() => "deploy",
                Action::Build(_) => "build",
                Action::Approval(_) => "approval",
            };
            println!("       [{}] {} ({})", action.run_order(), action.name(), kind);
        }
    }
    Ok(())
}

//! pipegraph CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pipegraph")]
#[command(about = "Delivery pipeline graph builder", long_about = None)]
struct Cli {
    /// Path to the pipeline definition
    #[arg(long, env = "PIPEGRAPH_DEFINITION", default_value = "pipeline.kdl")]
    definition: PathBuf,

    /// Directory holding build.yaml and deploy.yaml
    #[arg(long, env = "PIPEGRAPH_SCRIPTS_DIR", default_value = "buildspec")]
    scripts: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the pipeline graph and print it
    Synth {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Template)]
        format: OutputFormat,
    },
    /// Check that the definition and scripts build a valid graph
    Validate,
    /// Print the stage and action outline
    Stages,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The graph as JSON
    Json,
    /// The graph as YAML
    Yaml,
    /// The rendered provider template as JSON
    Template,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth { format } => {
            commands::synth(&cli.definition, &cli.scripts, format)?;
        }
        Commands::Validate => {
            commands::validate(&cli.definition, &cli.scripts)?;
        }
        Commands::Stages => {
            commands::stages(&cli.definition, &cli.scripts)?;
        }
    }

    Ok(())
}

// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, parse arguments, run one collector.
// - Returns `anyhow::Result` so any collector error ends the process non-zero.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use pirogue_colander::ui::{prompt_experiment_name, BarProgress, PromptResolver};
use pirogue_colander::{
    ArtifactCollector, Configuration, ExperimentCollector, FixedType, FolderCollector, TypeChoice,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pirogue-colander", version, about = "PiRogue Colander connector")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Edit Colander configuration
    Config {
        /// Base URL of your Colander server
        #[arg(short = 'u', long)]
        base_url: String,
        /// Your Colander API key
        #[arg(short = 'k', long, env = "COLANDER_API_KEY")]
        api_key: String,
    },
    /// Upload an artifact (or every file of a folder) to Colander
    CollectArtifact {
        /// File or folder to upload
        path: PathBuf,
        /// ID of the case you created in Colander
        #[arg(short, long)]
        case_id: String,
        /// Artifact type short name; asked interactively when omitted
        #[arg(short = 't', long = "type")]
        artifact_type: Option<String>,
    },
    /// Upload an entire PiRogue experiment to Colander
    CollectExperiment {
        /// Experiment directory containing experiment.json
        path: PathBuf,
        /// ID of the case you created in Colander
        #[arg(short, long)]
        case_id: String,
        /// The artifact you executed during this experiment
        #[arg(short, long)]
        target_artifact: Option<PathBuf>,
        /// Experiment name; asked interactively when omitted
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Config { base_url, api_key } => {
            let mut config = Configuration::load().unwrap_or_default();
            config.save(&base_url, &api_key)?;
            tracing::info!(base_url = %base_url, "configuration saved");
        }
        Command::CollectArtifact {
            path,
            case_id,
            artifact_type,
        } => {
            let api = Configuration::load()?.client()?;
            let mut progress = BarProgress::new();
            if path.is_dir() {
                let folder = FolderCollector::new(&api, &path, &case_id)?;
                let artifacts = match &artifact_type {
                    Some(name) => folder.collect(&FixedType(name.clone()), &mut progress)?,
                    None => folder.collect(&PromptResolver, &mut progress)?,
                };
                tracing::info!(count = artifacts.len(), "folder uploaded");
            } else {
                let choice = match &artifact_type {
                    Some(name) => TypeChoice::Named(name),
                    None => TypeChoice::Ask(&PromptResolver),
                };
                ArtifactCollector::new(&api, path, &case_id, choice, Default::default())?
                    .collect(&mut progress)?;
            }
        }
        Command::CollectExperiment {
            path,
            case_id,
            target_artifact,
            name,
        } => {
            let api = Configuration::load()?.client()?;
            let name = match name {
                Some(name) => name,
                None => prompt_experiment_name()?,
            };
            let collector = ExperimentCollector::new(
                &api,
                &PromptResolver,
                path,
                &case_id,
                &name,
                target_artifact,
            )?;
            collector.collect(&mut BarProgress::new())?;
        }
    }
    Ok(())
}

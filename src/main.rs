use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use workflow_forge::{
    config::ForgeConfig, init_telemetry, load_script, pipeline_metrics, replay, MachineSettings,
    PipelineState, SessionRegistry, UpliftPolicy, WizardStep, TRANSITION_TABLE,
};

#[derive(Parser)]
#[command(name = "workflow-forge")]
#[command(about = "Drive the prompt-to-workflow pipeline state machine")]
#[command(long_about = "Workflow Forge enforces the stages a natural-language prompt passes through \
                       on its way to an executable workflow. Inspect the transition table, or replay \
                       a JSON script of pipeline operations and print the resulting state.")]
struct Cli {
    /// Configuration file to use instead of the default search
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    config: Option<PathBuf>,

    /// Emit single-line JSON
    #[arg(long, global = true, help = "Print compact JSON instead of pretty-printed")]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the transition table
    Table,
    /// Print the wizard step of every pipeline state
    Steps,
    /// Replay a JSON script of pipeline operations against a fresh session
    Replay {
        /// Script file: a JSON array of {"op": ...} steps
        file: PathBuf,
        /// Refuse to build without a confirmed understanding
        #[arg(long, help = "Use the strict uplift policy regardless of configuration")]
        strict: bool,
    },
}

#[derive(Serialize)]
struct TableRow {
    from: PipelineState,
    to: &'static [PipelineState],
    terminal: bool,
}

#[derive(Serialize)]
struct StepRow {
    state: PipelineState,
    step: WizardStep,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ForgeConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => workflow_forge::init_config()?.clone(),
    };
    init_telemetry(&config.observability)?;

    match cli.command {
        Commands::Table => {
            let rows: Vec<TableRow> = TRANSITION_TABLE
                .rows()
                .map(|(from, to)| TableRow {
                    from,
                    to,
                    terminal: from.is_terminal(),
                })
                .collect();
            print_json(&rows, cli.compact)?;
        }
        Commands::Steps => {
            let rows: Vec<StepRow> = PipelineState::ALL
                .iter()
                .map(|&state| StepRow {
                    state,
                    step: WizardStep::from(state),
                })
                .collect();
            print_json(&rows, cli.compact)?;
        }
        Commands::Replay { file, strict } => {
            let mut settings = MachineSettings::from_config(&config.pipeline);
            if strict {
                settings.uplift_policy = UpliftPolicy::Strict;
            }
            let steps = load_script(&file)?;

            let report = tokio::runtime::Runtime::new()?.block_on(async move {
                let registry = SessionRegistry::new(settings);
                let session_id = registry.create().await;
                let report = registry
                    .with_session(session_id, |machine| replay(machine, steps))
                    .await?;
                registry.abandon(session_id).await;
                Ok::<_, anyhow::Error>(report)
            })?;
            print_json(&report, cli.compact)?;
        }
    }

    if config.observability.metrics_enabled {
        pipeline_metrics().log_stats();
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}

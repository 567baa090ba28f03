use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use orchestrator_cli::config::CliConfig;
use orchestrator_cli::engine;
use orchestrator_core::types::ProjectSnapshot;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "orchestrator-cli")]
#[command(about = "Runs orchestration ticks and the daily strategy evolver batch")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file path (TOML). Missing sections fall back to defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,

    /// Run against in-memory/deterministic backends instead of the configured
    /// redb file, Chronicle database, and downstream HTTP services.
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs one orchestration tick against a project snapshot.
    Tick {
        /// Project id to orchestrate for.
        #[arg(long)]
        project_id: String,
        /// Path to a JSON-encoded `ProjectSnapshot`. Fetched live from the
        /// Project service when omitted.
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,
    },
    /// Runs the daily strategy evolution batch once.
    Evolve,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn load_snapshot(
    runtime: &engine::Runtime,
    project_id: &str,
    path: Option<&PathBuf>,
) -> anyhow::Result<ProjectSnapshot> {
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot file: {}", path.display()))?;
        return serde_json::from_str(&text).with_context(|| format!("invalid snapshot JSON in {}", path.display()));
    }
    runtime
        .project_client
        .get_snapshot(project_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("project {project_id} not found"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CliConfig::load(cli.config.as_deref())?;
    let runtime = engine::build(&config, cli.ephemeral).await?;

    match cli.command {
        Commands::Tick { project_id, snapshot } => {
            let snapshot = load_snapshot(&runtime, &project_id, snapshot.as_ref()).await?;
            let result = runtime.decision_engine.run(&snapshot, &config.engine.options, Uuid::new_v4()).await;
            println!("{}", serde_json::to_string_pretty(&result.decision)?);
            for outcome in &result.action_outcomes {
                tracing::info!(action = %outcome.action, succeeded = outcome.succeeded, detail = %outcome.detail, "action outcome");
            }
        }
        Commands::Evolve => {
            let report = runtime.strategy_evolver.run_daily_evolution().await;
            println!(
                "patterns_extracted={} strategies_generated={} strategies_optimized={} strategies_deactivated={} performance_logs_pruned={} overall_success={}",
                report.patterns_extracted,
                report.strategies_generated,
                report.strategies_optimized,
                report.strategies_deactivated,
                report.performance_logs_pruned,
                report.overall_success(),
            );
            if !report.overall_success() {
                anyhow::bail!("one or more evolution phases failed, see logs above");
            }
        }
    }

    Ok(())
}

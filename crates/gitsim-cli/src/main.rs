mod cmd_repl;
mod cmd_scenario;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gitsim_core::SimConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gitsim",
    version,
    about = "Commit-ledger and GitOps rollout simulator"
)]
struct Cli {
    /// Simulator settings (YAML). Missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scripted walkthrough: ledger sync, deploy, rollback
    Scenario {
        /// Print the final snapshot as JSON instead of step output
        #[arg(long)]
        json: bool,
    },
    /// Drive the simulator interactively from stdin
    Repl {
        /// Wait the configured phase delays instead of skipping them
        #[arg(long)]
        real_delays: bool,
        /// Pipeline override file (YAML, repeatable)
        #[arg(long = "pipeline")]
        pipelines: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Scenario { json } => cmd_scenario::execute(config, json),
        Command::Repl {
            real_delays,
            pipelines,
        } => cmd_repl::execute(config, real_delays, &pipelines),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GITSIM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(p) => SimConfig::load(p),
        None => Ok(SimConfig::default()),
    }
}

/// Current-thread runtime; the simulator never needs more than one worker.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_ccnsim_engine::config::StrategyKind;
use std::path::PathBuf;

mod commands;
mod utils;

/// ccnsim: content-centric network simulator
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more experiments and report their metrics
    Run {
        /// Experiment file (TOML, JSON or YAML)
        #[clap(short, long)]
        config: Option<PathBuf>,

        #[clap(flatten)]
        overrides: Overrides,

        /// Print one JSON report per experiment
        #[clap(long)]
        json: bool,
    },

    /// Print the nodes and static routes of the configured topology
    Topology {
        /// Experiment file (TOML, JSON or YAML)
        #[clap(short, long)]
        config: Option<PathBuf>,
    },

    /// Run a short experiment and dump per-router table sizes
    Inspect {
        /// Experiment file (TOML, JSON or YAML)
        #[clap(short, long)]
        config: Option<PathBuf>,

        #[clap(flatten)]
        overrides: Overrides,
    },
}

/// Settings applied on top of every loaded experiment
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Overrides {
    /// RNG seed
    #[clap(long)]
    pub seed: Option<u64>,

    /// Forwarding strategy
    #[clap(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Caching probability for the static-only strategy
    #[clap(long)]
    pub cache_probability: Option<f64>,

    /// Stop after this many responses
    #[clap(short, long)]
    pub responses: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    DoMyBest,
    StaticOnly,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::DoMyBest => StrategyKind::DoMyBest,
            StrategyArg::StaticOnly => StrategyKind::StaticOnly,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" }
    )).init();

    match cli.command {
        Commands::Run { config, overrides, json } => {
            commands::run::run_experiments(config, overrides, json).await?;
        }
        Commands::Topology { config } => {
            commands::topology::show_topology(config)?;
        }
        Commands::Inspect { config, overrides } => {
            commands::inspect::inspect(config, overrides).await?;
        }
    }

    Ok(())
}

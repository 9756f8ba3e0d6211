//! mfb - multi-fidelity bandit experiment runner
//!
//! Runs the configured policies against a simulated multi-fidelity bandit
//! under a total cost budget and reports averaged regret, optimal-action
//! fraction and plays per fidelity.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{run, sweep};

#[derive(Parser)]
#[command(name = "mfb")]
#[command(author, version, about = "mfb - multi-fidelity bandit simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./mfb.toml, then ~/.config/mfb/mfb.toml)
    #[arg(short, long, global = true, env = "MFB_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured policy at one budget
    Run(run::RunArgs),

    /// Run every configured policy across several budgets
    Sweep(sweep::SweepArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mfb={level},mfb_sim={level},mfb_core={level}").into());

    // Logs go to stderr so report tables on stdout stay clean
    let text = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = config::Config::load(cli.config.as_deref());
    let (level, json) = match &loaded {
        Ok(config) => (config.logging.level.clone(), config.logging.json),
        Err(_) => ("info".to_string(), false),
    };
    let level = if cli.verbose { "debug".to_string() } else { level };
    init_tracing(&level, json);

    if let Ok(config) = &loaded {
        match &config.source {
            Some(path) => tracing::debug!(path = %path.display(), "Loaded configuration"),
            None => tracing::debug!("No config file found, using defaults"),
        }
    }

    match cli.command {
        Commands::Run(args) => run::run(args, loaded?).await,
        Commands::Sweep(args) => sweep::run(args, loaded?).await,
        Commands::Config(cmd) => commands::config::run(cmd, loaded).await,
    }
}

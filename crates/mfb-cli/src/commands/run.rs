//! Run every configured policy at one budget

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use mfb_sim::{Environment, RunReport};

use super::output;
use crate::config::Config;

#[derive(Args)]
pub struct RunArgs {
    /// Total cost budget per repetition
    #[arg(short, long)]
    pub budget: Option<f64>,

    /// Number of independent repetitions to average
    #[arg(short, long)]
    pub experiments: Option<usize>,

    /// Run seed; repetition seeds are derived from it
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Repetitions in flight at once (1 runs sequentially)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Write the reports as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: RunArgs, config: Config) -> Result<()> {
    let experiment = &config.experiment;
    let budget = args.budget.unwrap_or(experiment.budget);
    let experiments = args.experiments.unwrap_or(experiment.experiments);
    let seed = args.seed.unwrap_or(experiment.seed);
    let workers = args.workers.unwrap_or(experiment.workers);

    let mut reports = Vec::new();
    for env in config.environments()? {
        reports.push(run_one(env, budget, experiments, seed, workers).await?);
    }

    output::print_reports(&reports);
    if let Some(path) = &args.output {
        output::write_reports(path, &reports)?;
    }
    Ok(())
}

/// Sequential for a single worker, otherwise on the blocking pool
pub(crate) async fn run_one(
    mut env: Environment,
    budget: f64,
    experiments: usize,
    seed: u64,
    workers: usize,
) -> Result<RunReport> {
    let report = if workers <= 1 {
        env.run(budget, experiments, seed)?
    } else {
        env.run_parallel(budget, experiments, seed, workers).await?
    };
    Ok(report)
}

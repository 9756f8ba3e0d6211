//! Run every configured policy across a list of budgets

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use super::output;
use super::run::run_one;
use crate::config::Config;

#[derive(Args)]
pub struct SweepArgs {
    /// Comma-separated budgets, e.g. 1000,5000,10000
    #[arg(short, long, value_delimiter = ',')]
    pub budgets: Vec<f64>,

    /// Number of independent repetitions per budget
    #[arg(short, long)]
    pub experiments: Option<usize>,

    /// Run seed shared by every budget
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Repetitions in flight at once (1 runs sequentially)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Write the reports as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: SweepArgs, config: Config) -> Result<()> {
    let experiment = &config.experiment;
    let budgets = if args.budgets.is_empty() {
        experiment.budgets.clone()
    } else {
        args.budgets
    };
    if budgets.is_empty() {
        bail!("no budgets to sweep");
    }
    let experiments = args.experiments.unwrap_or(experiment.experiments);
    let seed = args.seed.unwrap_or(experiment.seed);
    let workers = args.workers.unwrap_or(experiment.workers);

    let mut reports = Vec::with_capacity(budgets.len() * config.policies.len());
    for env in config.environments()? {
        for &budget in &budgets {
            reports.push(run_one(env.clone(), budget, experiments, seed, workers).await?);
        }
    }

    output::print_reports(&reports);
    if let Some(path) = &args.output {
        output::write_reports(path, &reports)?;
    }
    Ok(())
}

//! Environment - the budget-constrained experiment runner
//!
//! One repetition walks `Init -> ForcedExploration -> AdaptiveSelection` and
//! stops with a [`Termination`]. Repetitions are independent; each one gets
//! its own RNG seed drawn up front from the run seed, so sequential and
//! parallel runs produce identical reports.

use std::sync::Arc;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use mfb_core::{Action, MfbError, Result, Reward};

use crate::agent::Agent;
use crate::bandit::Bandit;
use crate::policy::WarmStart;
use crate::report::{ReportContext, RepetitionOutcome, RunReport, Termination};

/// Default cap on adaptive steps per repetition
pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;

/// Running totals for one repetition
struct Tally {
    plays: Array2<u64>,
    regret: f64,
    pulls: u64,
    optimal_pulls: u64,
}

impl Tally {
    fn new(k: usize, m: usize, regret: f64) -> Self {
        Self {
            plays: Array2::zeros((k, m)),
            regret,
            pulls: 0,
            optimal_pulls: 0,
        }
    }

    fn record(&mut self, action: Action, deduction: f64, optimal: bool) {
        self.plays[[action.arm, action.fidelity]] += 1;
        self.regret -= deduction;
        self.pulls += 1;
        self.optimal_pulls += u64::from(optimal);
    }
}

/// Runs an agent against a bandit under a total cost budget
#[derive(Debug, Clone)]
pub struct Environment {
    bandit: Bandit,
    agent: Agent,
    label: String,
    max_steps: u64,
}

impl Environment {
    pub fn new(bandit: Bandit, agent: Agent, label: impl Into<String>) -> Self {
        Self {
            bandit,
            agent,
            label: label.into(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Cap adaptive steps per repetition (guards against zero-cost spins)
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bandit(&self) -> &Bandit {
        &self.bandit
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Fresh ground truth and a blank agent
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.bandit.reset(rng);
        self.agent.reset();
    }

    /// Run one repetition seeded with `seed`
    pub fn run_repetition(&mut self, budget: f64, seed: u64) -> Result<RepetitionOutcome> {
        validate_budget(budget)?;
        let mut rng = StdRng::seed_from_u64(seed);

        // Init
        self.reset(&mut rng);
        let optimal = self.bandit.optimal();
        let mut tally = Tally::new(
            self.bandit.k(),
            self.bandit.m(),
            budget * self.bandit.optimal_mean(),
        );

        // Forced exploration
        self.warm_start(&mut tally, &mut rng)?;

        // Adaptive selection
        let termination = self.adaptive(budget, &mut tally, &mut rng)?;

        debug!(
            label = %self.label,
            seed,
            regret = tally.regret,
            spend = self.agent.lambda(),
            pulls = tally.pulls,
            ?termination,
            "Repetition complete"
        );

        Ok(RepetitionOutcome {
            seed,
            plays: tally.plays,
            regret: tally.regret,
            spend: self.agent.lambda(),
            pulls: tally.pulls,
            optimal_pulls: tally.optimal_pulls,
            optimal,
            termination,
        })
    }

    /// Pull every arm once per warm-start fidelity, top fidelity first.
    /// These pulls are not checked against the budget.
    fn warm_start<R: Rng + ?Sized>(&mut self, tally: &mut Tally, rng: &mut R) -> Result<()> {
        let top = self.bandit.top_fidelity();
        let lowest = match self.agent.policy().warm_start() {
            WarmStart::AllFidelities => 0,
            WarmStart::TopFidelity => top,
        };
        for arm in 0..self.bandit.k() {
            for fidelity in (lowest..=top).rev() {
                let action = Action::new(arm, fidelity);
                let (reward, optimal) = self.bandit.pull(action, rng)?;
                self.commit(action, reward, optimal, tally)?;
            }
        }
        Ok(())
    }

    fn adaptive<R: Rng + ?Sized>(
        &mut self,
        budget: f64,
        tally: &mut Tally,
        rng: &mut R,
    ) -> Result<Termination> {
        let cheapest = self.bandit.min_cost();
        let mut steps = 0u64;

        while self.agent.lambda() <= budget {
            if self.agent.lambda() + cheapest > budget {
                break;
            }
            if steps >= self.max_steps {
                warn!(label = %self.label, steps, "Step limit reached before budget ran out");
                return Ok(Termination::StepLimit);
            }
            steps += 1;

            let action = self.agent.choose(rng);
            let (reward, optimal) = self.bandit.pull(action, rng)?;
            let cost = self.bandit.cost(action.fidelity);

            if self.agent.lambda() + cost <= budget {
                self.agent.observe(reward)?;
                tally.record(action, self.deduction(action), optimal);
            } else {
                debug!(
                    %action,
                    lambda = self.agent.lambda(),
                    "Chosen action unaffordable, downgrading"
                );
                return self.downgrade(action, budget, steps, tally, rng);
            }
        }
        Ok(Termination::BudgetExhausted)
    }

    /// Spend the rest of the budget on the chosen arm, walking down from the
    /// fidelity just below the unaffordable one
    fn downgrade<R: Rng + ?Sized>(
        &mut self,
        chosen: Action,
        budget: f64,
        mut steps: u64,
        tally: &mut Tally,
        rng: &mut R,
    ) -> Result<Termination> {
        for fidelity in (0..chosen.fidelity).rev() {
            let action = Action::new(chosen.arm, fidelity);
            let cost = self.bandit.cost(fidelity);
            while self.agent.lambda() + cost <= budget {
                if steps >= self.max_steps {
                    warn!(label = %self.label, steps, "Step limit reached while downgrading");
                    return Ok(Termination::StepLimit);
                }
                steps += 1;
                let (reward, optimal) = self.bandit.pull(action, rng)?;
                self.commit(action, reward, optimal, tally)?;
            }
        }
        Ok(Termination::DowngradeExhausted)
    }

    fn commit(
        &mut self,
        action: Action,
        reward: Reward,
        optimal: bool,
        tally: &mut Tally,
    ) -> Result<()> {
        self.agent.observe_action(action, reward)?;
        tally.record(action, self.deduction(action), optimal);
        Ok(())
    }

    /// Regret charged for one play: its cost in units of the arm's top-fidelity mean
    fn deduction(&self, action: Action) -> f64 {
        self.bandit.cost(action.fidelity) * self.bandit.top_mean(action.arm)
    }

    fn context(&self, budget: f64, seed: u64) -> ReportContext {
        let policy = self.agent.policy();
        ReportContext {
            label: self.label.clone(),
            policy: policy.name().to_string(),
            policy_params: policy.params(),
            budget,
            seed,
        }
    }

    /// Run `experiments` independent repetitions in sequence and average them
    pub fn run(&mut self, budget: f64, experiments: usize, seed: u64) -> Result<RunReport> {
        validate_budget(budget)?;
        let seeds = repetition_seeds(seed, experiments)?;
        info!(
            label = %self.label,
            policy = self.agent.policy().name(),
            budget,
            experiments,
            "Starting run"
        );

        let mut outcomes = Vec::with_capacity(experiments);
        for rep_seed in seeds {
            outcomes.push(self.run_repetition(budget, rep_seed)?);
        }

        let report = RunReport::aggregate(self.context(budget, seed), &outcomes)?;
        info!(
            label = %self.label,
            regret = report.regret,
            optimal_fraction = report.optimal_fraction,
            "Run complete"
        );
        Ok(report)
    }

    /// Same as [`Environment::run`], with at most `workers` repetitions in
    /// flight on tokio's blocking pool. Outcomes are merged in repetition
    /// order, so the report matches the sequential one for the same seed.
    pub async fn run_parallel(
        &self,
        budget: f64,
        experiments: usize,
        seed: u64,
        workers: usize,
    ) -> Result<RunReport> {
        validate_budget(budget)?;
        let seeds = repetition_seeds(seed, experiments)?;
        let workers = workers.max(1);
        info!(
            label = %self.label,
            policy = self.agent.policy().name(),
            budget,
            experiments,
            workers,
            "Starting parallel run"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for (index, rep_seed) in seeds.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| MfbError::Simulation(format!("worker pool closed: {e}")))?;
            let mut env = self.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                env.run_repetition(budget, rep_seed).map(|outcome| (index, outcome))
            });
        }

        let mut slots: Vec<Option<RepetitionOutcome>> = (0..experiments).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined
                .map_err(|e| MfbError::Simulation(format!("repetition worker failed: {e}")))??;
            slots[index] = Some(outcome);
        }
        let outcomes = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| MfbError::Simulation("missing repetition outcome".to_string()))?;

        let report = RunReport::aggregate(self.context(budget, seed), &outcomes)?;
        info!(
            label = %self.label,
            regret = report.regret,
            optimal_fraction = report.optimal_fraction,
            "Parallel run complete"
        );
        Ok(report)
    }

    /// One report per budget, each using the same run seed
    pub fn sweep(
        &mut self,
        budgets: &[f64],
        experiments: usize,
        seed: u64,
    ) -> Result<Vec<RunReport>> {
        budgets
            .iter()
            .map(|&budget| self.run(budget, experiments, seed))
            .collect()
    }
}

fn validate_budget(budget: f64) -> Result<()> {
    if budget.is_finite() && budget >= 0.0 {
        Ok(())
    } else {
        Err(MfbError::config(format!(
            "budget must be finite and >= 0, got {budget}"
        )))
    }
}

/// Per-repetition seeds derived from the run seed
pub fn repetition_seeds(seed: u64, experiments: usize) -> Result<Vec<u64>> {
    if experiments == 0 {
        return Err(MfbError::config("experiments must be at least 1"));
    }
    let mut master = StdRng::seed_from_u64(seed);
    Ok((0..experiments).map(|_| master.gen()).collect())
}

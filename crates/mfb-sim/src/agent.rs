//! Value-estimating agent
//!
//! The agent keeps per-(arm, fidelity) running mean estimates and play counts,
//! tracks cumulative spend (lambda) and delegates action selection to its
//! [`Policy`].

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use mfb_core::{Action, MfbError, Result, Reward};

use crate::bandit::Bandit;
use crate::policy::Policy;

/// Step size schedule for the value update
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepSize {
    /// `1 / n`: the running sample mean
    #[default]
    SampleAverage,
    /// Fixed learning rate in `(0, 1]`
    Constant { gamma: f64 },
}

impl StepSize {
    fn validate(&self) -> Result<()> {
        match self {
            StepSize::Constant { gamma } if !(*gamma > 0.0 && *gamma <= 1.0) => Err(
                MfbError::config(format!("constant step size must be in (0, 1], got {gamma}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Learner state for one multi-fidelity bandit
#[derive(Debug, Clone)]
pub struct Agent {
    policy: Policy,
    k: usize,
    m: usize,
    costs: Vec<f64>,
    zeta: Array2<f64>,
    /// `k x (m - 1)` fidelity escalation thresholds
    gamma: Array2<f64>,
    prior: f64,
    step_size: StepSize,
    value_estimates: Array2<f64>,
    action_attempts: Array2<u64>,
    t: u64,
    lambda: f64,
    last_action: Option<Action>,
}

impl Agent {
    /// Build an agent for `bandit`, inheriting its shape, costs and zeta bounds
    pub fn new(bandit: &Bandit, policy: Policy) -> Result<Self> {
        policy.validate()?;
        let (k, m) = (bandit.k(), bandit.m());
        let costs = bandit.costs().to_vec();
        let zeta = bandit.zeta().clone();
        let gamma = gamma_thresholds(&costs, &zeta);

        Ok(Self {
            policy,
            k,
            m,
            costs,
            zeta,
            gamma,
            prior: 0.0,
            step_size: StepSize::default(),
            value_estimates: Array2::zeros((k, m)),
            action_attempts: Array2::zeros((k, m)),
            t: 0,
            lambda: 0.0,
            last_action: None,
        })
    }

    /// Initial value estimate for every action
    pub fn with_prior(mut self, prior: f64) -> Result<Self> {
        if !prior.is_finite() {
            return Err(MfbError::config(format!("prior must be finite, got {prior}")));
        }
        self.prior = prior;
        self.value_estimates.fill(prior);
        Ok(self)
    }

    pub fn with_step_size(mut self, step_size: StepSize) -> Result<Self> {
        step_size.validate()?;
        self.step_size = step_size;
        Ok(self)
    }

    /// Forget everything learned: prior estimates, zero counts, zero spend
    pub fn reset(&mut self) {
        self.value_estimates.fill(self.prior);
        self.action_attempts.fill(0);
        self.t = 0;
        self.lambda = 0.0;
        self.last_action = None;
    }

    /// Ask the policy for the next action and remember it for [`Agent::observe`]
    pub fn choose<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Action {
        let policy = self.policy;
        let action = policy.choose(self, rng);
        self.last_action = Some(action);
        action
    }

    /// Update the estimate of the most recently chosen action with `reward`
    pub fn observe(&mut self, reward: Reward) -> Result<()> {
        let action = self.last_action.ok_or(MfbError::NoActionRecorded)?;
        action.validate(self.k, self.m)?;
        self.update(action, reward);
        Ok(())
    }

    /// Record a play of an action picked outside the policy (warm start,
    /// budget downgrade) and update its estimate
    pub fn observe_action(&mut self, action: Action, reward: Reward) -> Result<()> {
        action.validate(self.k, self.m)?;
        self.last_action = Some(action);
        self.update(action, reward);
        Ok(())
    }

    fn update(&mut self, action: Action, reward: Reward) {
        let idx = [action.arm, action.fidelity];
        self.action_attempts[idx] += 1;

        let g = match self.step_size {
            StepSize::SampleAverage => 1.0 / self.action_attempts[idx] as f64,
            StepSize::Constant { gamma } => gamma,
        };
        let q = self.value_estimates[idx];
        self.value_estimates[idx] = q + g * (reward - q);

        self.t += 1;
        self.lambda += self.costs[action.fidelity];
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn top_fidelity(&self) -> usize {
        self.m - 1
    }

    pub fn value_estimates(&self) -> &Array2<f64> {
        &self.value_estimates
    }

    pub fn action_attempts(&self) -> &Array2<u64> {
        &self.action_attempts
    }

    pub fn value(&self, arm: usize, fidelity: usize) -> f64 {
        self.value_estimates[[arm, fidelity]]
    }

    pub fn attempts(&self, arm: usize, fidelity: usize) -> u64 {
        self.action_attempts[[arm, fidelity]]
    }

    pub fn zeta(&self, arm: usize, fidelity: usize) -> f64 {
        self.zeta[[arm, fidelity]]
    }

    /// Escalation threshold for a non-top fidelity; `None` at the top
    pub fn gamma_threshold(&self, arm: usize, fidelity: usize) -> Option<f64> {
        (fidelity + 1 < self.m).then(|| self.gamma[[arm, fidelity]])
    }

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    /// Number of observed plays
    pub fn t(&self) -> u64 {
        self.t
    }

    /// Cumulative cost of observed plays
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }
}

/// `gamma[a, f] = sqrt(cost[f] / cost[f + 1] * zeta[a, f]^2)`.
/// A free next fidelity counts as a cost ratio of 1.
fn gamma_thresholds(costs: &[f64], zeta: &Array2<f64>) -> Array2<f64> {
    let (k, m) = zeta.dim();
    let mut gamma = Array2::zeros((k, m.saturating_sub(1)));
    for fidelity in 0..m.saturating_sub(1) {
        let ratio = if costs[fidelity + 1] > 0.0 {
            costs[fidelity] / costs[fidelity + 1]
        } else {
            1.0
        };
        for arm in 0..k {
            let z = zeta[[arm, fidelity]];
            gamma[[arm, fidelity]] = (ratio * z * z).sqrt();
        }
    }
    gamma
}

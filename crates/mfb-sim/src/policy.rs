//! Selection policies
//!
//! Policies are stateless: every decision is a pure function of the agent's
//! tables plus the caller's random source (used only for tie-breaking and
//! epsilon exploration).

use rand::Rng;
use serde::{Deserialize, Serialize};

use mfb_core::{Action, MfbError, Result};

use crate::agent::Agent;

/// Inverse of the tail-bound function used to size exploration bonuses.
/// Monotone increasing with `psi_inv(0) = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PsiInv {
    #[default]
    Sqrt,
    Power {
        exponent: f64,
    },
}

impl PsiInv {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            PsiInv::Sqrt => x.sqrt(),
            PsiInv::Power { exponent } => x.powf(*exponent),
        }
    }
}

/// Hyperparameters shared by UCB and MF-UCB
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UcbParams {
    /// Exploration constant, > 0
    pub rho: f64,
    pub psi_inv: PsiInv,
}

impl Default for UcbParams {
    fn default() -> Self {
        Self {
            rho: 2.0,
            psi_inv: PsiInv::Sqrt,
        }
    }
}

impl UcbParams {
    /// `psi_inv(rho * ln(t + 1) / n)`, or `+inf` for an action never played
    pub fn bonus(&self, agent: &Agent, arm: usize, fidelity: usize) -> f64 {
        let n = agent.attempts(arm, fidelity);
        if n == 0 {
            return f64::INFINITY;
        }
        let t = agent.t() as f64;
        self.psi_inv.apply(self.rho * (t + 1.0).ln() / n as f64)
    }

    fn validate(&self) -> Result<()> {
        if !(self.rho.is_finite() && self.rho > 0.0) {
            return Err(MfbError::config(format!(
                "rho must be finite and > 0, got {}",
                self.rho
            )));
        }
        if let PsiInv::Power { exponent } = self.psi_inv {
            if !(exponent.is_finite() && exponent > 0.0) {
                return Err(MfbError::config(format!(
                    "psi_inv exponent must be finite and > 0, got {exponent}"
                )));
            }
        }
        Ok(())
    }
}

/// Which actions the runner pulls once before adaptive selection starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmStart {
    /// Every (arm, fidelity) pair
    AllFidelities,
    /// Every arm at the top fidelity only
    TopFidelity,
}

/// The closed set of selection policies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Policy {
    Greedy,
    EpsilonGreedy { epsilon: f64 },
    /// Single-fidelity UCB over the top fidelity
    Ucb(UcbParams),
    /// Multi-fidelity UCB with cost-aware fidelity escalation
    MfUcb(UcbParams),
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::Greedy => "greedy",
            Policy::EpsilonGreedy { .. } => "epsilon_greedy",
            Policy::Ucb(_) => "ucb",
            Policy::MfUcb(_) => "mf_ucb",
        }
    }

    pub fn warm_start(&self) -> WarmStart {
        match self {
            Policy::Ucb(_) => WarmStart::TopFidelity,
            Policy::Greedy | Policy::EpsilonGreedy { .. } | Policy::MfUcb(_) => {
                WarmStart::AllFidelities
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Policy::Greedy => Ok(()),
            Policy::EpsilonGreedy { epsilon } => {
                if (0.0..=1.0).contains(epsilon) {
                    Ok(())
                } else {
                    Err(MfbError::config(format!(
                        "epsilon must be in [0, 1], got {epsilon}"
                    )))
                }
            }
            Policy::Ucb(params) | Policy::MfUcb(params) => params.validate(),
        }
    }

    /// Policy parameters as JSON, for reports
    pub fn params(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Pick the next action from the agent's current statistics
    pub fn choose<R: Rng + ?Sized>(&self, agent: &Agent, rng: &mut R) -> Action {
        match self {
            Policy::Greedy => greedy(agent, rng),
            Policy::EpsilonGreedy { epsilon } => {
                if rng.gen::<f64>() < *epsilon {
                    Action::new(rng.gen_range(0..agent.k()), rng.gen_range(0..agent.m()))
                } else {
                    greedy(agent, rng)
                }
            }
            Policy::Ucb(params) => {
                let top = agent.top_fidelity();
                let arm = argmax_random(
                    (0..agent.k()).map(|a| agent.value(a, top) + params.bonus(agent, a, top)),
                    rng,
                );
                Action::new(arm, top)
            }
            Policy::MfUcb(params) => mf_ucb(params, agent, rng),
        }
    }
}

fn greedy<R: Rng + ?Sized>(agent: &Agent, rng: &mut R) -> Action {
    let index = argmax_random(agent.value_estimates().iter().copied(), rng);
    Action::from_index(index, agent.m())
}

fn mf_ucb<R: Rng + ?Sized>(params: &UcbParams, agent: &Agent, rng: &mut R) -> Action {
    let top = agent.top_fidelity();

    // Pessimistic cross-fidelity bound per arm.
    let lower_bounds = (0..agent.k()).map(|arm| {
        (0..agent.m())
            .map(|f| agent.value(arm, f) + params.bonus(agent, arm, f) + agent.zeta(arm, f))
            .fold(f64::INFINITY, f64::min)
    });
    let arm = argmax_random(lower_bounds, rng);

    // Cheapest fidelity whose confidence width is still above its threshold.
    let fidelity = (0..top)
        .find(|&f| {
            agent
                .gamma_threshold(arm, f)
                .is_some_and(|gamma| params.bonus(agent, arm, f) >= gamma)
        })
        .unwrap_or(top);

    Action::new(arm, fidelity)
}

/// Index of the maximum value, uniformly random among exact ties.
/// NaN entries are never selected unless every entry is NaN.
pub fn argmax_random<I, R>(values: I, rng: &mut R) -> usize
where
    I: IntoIterator<Item = f64>,
    R: Rng + ?Sized,
{
    let mut best = f64::NEG_INFINITY;
    let mut candidates: Vec<usize> = Vec::new();
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if candidates.is_empty() || v > best {
            best = v;
            candidates.clear();
            candidates.push(i);
        } else if v == best {
            candidates.push(i);
        }
    }
    match candidates.len() {
        0 => 0,
        1 => candidates[0],
        n => candidates[rng.gen_range(0..n)],
    }
}

//! Multi-fidelity bandit - the stochastic reward oracle
//!
//! A bandit owns the ground-truth mean matrix (arms x fidelities), the zeta
//! bounds, the per-fidelity costs and the identity of the optimal action.
//! None of this is visible to the agent; only the runner reads it for regret.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mfb_core::{Action, MfbError, Result, Reward};

/// How the top-fidelity means are produced on every reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopMeans {
    /// Evenly spaced on `[0, 1]`, arm 0 lowest
    Grid,
    /// Drawn iid from `Normal(mean, std_dev)`, optionally sorted ascending
    Normal {
        mean: f64,
        std_dev: f64,
        #[serde(default)]
        sorted: bool,
    },
}

/// Source of the ground-truth mean matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeanModel {
    /// Caller-supplied `arms x fidelities` matrix, identical on every reset
    Fixed { means: Vec<Vec<f64>> },
    /// Top fidelity from `top`; every lower fidelity uniform within `+-zeta`
    /// of the top-fidelity mean of the same arm
    Banded { top: TopMeans },
}

/// Per-pull reward noise around the true mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardNoise {
    Gaussian { std_dev: f64 },
    /// Reward is 1.0 with probability `clamp(mean, 0, 1)`, else 0.0
    Bernoulli,
}

impl RewardNoise {
    fn validate(&self) -> Result<()> {
        match self {
            RewardNoise::Gaussian { std_dev } if !std_dev.is_finite() || *std_dev < 0.0 => Err(
                MfbError::config(format!("reward std_dev must be finite and >= 0, got {std_dev}")),
            ),
            _ => Ok(()),
        }
    }

    fn sample<R: Rng + ?Sized>(&self, mean: f64, rng: &mut R) -> Reward {
        match self {
            RewardNoise::Gaussian { std_dev } => {
                let z: f64 = StandardNormal.sample(rng);
                mean + std_dev * z
            }
            RewardNoise::Bernoulli => {
                if rng.gen::<f64>() < mean.clamp(0.0, 1.0) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Zeta bounds, either one value per fidelity (shared by all arms) or a full
/// per-arm matrix. Rows may omit the top fidelity, which is always 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZetaConfig {
    PerFidelity(Vec<f64>),
    PerArm(Vec<Vec<f64>>),
}

impl ZetaConfig {
    /// Expand into an `arms x fidelities` matrix with a zero top column
    pub fn to_matrix(&self, arms: usize, fidelities: usize) -> Result<Array2<f64>> {
        let mut zeta = Array2::zeros((arms, fidelities));
        match self {
            ZetaConfig::PerFidelity(row) => {
                let row = zeta_row(row, fidelities)?;
                for mut arm_row in zeta.rows_mut() {
                    arm_row.assign(&row);
                }
            }
            ZetaConfig::PerArm(rows) => {
                if rows.len() != arms {
                    return Err(MfbError::config(format!(
                        "zeta matrix has {} rows, expected one per arm ({arms})",
                        rows.len()
                    )));
                }
                for (arm, row) in rows.iter().enumerate() {
                    zeta.row_mut(arm).assign(&zeta_row(row, fidelities)?);
                }
            }
        }
        Ok(zeta)
    }
}

fn zeta_row(row: &[f64], fidelities: usize) -> Result<Array1<f64>> {
    let top = fidelities - 1;
    if row.len() != top && row.len() != fidelities {
        return Err(MfbError::config(format!(
            "zeta needs {top} or {fidelities} entries per arm, got {}",
            row.len()
        )));
    }
    if let Some(bad) = row.iter().find(|z| !z.is_finite() || **z < 0.0) {
        return Err(MfbError::config(format!(
            "zeta entries must be finite and >= 0, got {bad}"
        )));
    }
    if row.len() == fidelities && row[top] != 0.0 {
        return Err(MfbError::config(format!(
            "zeta at the top fidelity must be 0, got {}",
            row[top]
        )));
    }
    let mut out = Array1::zeros(fidelities);
    for (f, z) in row.iter().take(top).enumerate() {
        out[f] = *z;
    }
    Ok(out)
}

/// Bandit construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditConfig {
    pub arms: usize,
    pub fidelities: usize,
    /// One cost per fidelity, conventionally non-decreasing
    pub costs: Vec<f64>,
    pub zeta: ZetaConfig,
    pub means: MeanModel,
    pub noise: RewardNoise,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            arms: 10,
            fidelities: 3,
            costs: vec![1.0, 10.0, 100.0],
            zeta: ZetaConfig::PerFidelity(vec![0.2, 0.1, 0.0]),
            means: MeanModel::Banded {
                top: TopMeans::Normal {
                    mean: 0.0,
                    std_dev: 1.0,
                    sorted: false,
                },
            },
            noise: RewardNoise::Gaussian { std_dev: 1.0 },
        }
    }
}

#[derive(Debug, Clone)]
enum MeanSource {
    Fixed(Array2<f64>),
    Grid,
    Normal { dist: Normal<f64>, sorted: bool },
}

/// Multi-fidelity bandit with `k` arms and `m` fidelities per arm
#[derive(Debug, Clone)]
pub struct Bandit {
    k: usize,
    m: usize,
    costs: Vec<f64>,
    zeta: Array2<f64>,
    source: MeanSource,
    noise: RewardNoise,
    means: Array2<f64>,
    optimal: Action,
}

impl Bandit {
    /// Validate the configuration and build a bandit.
    ///
    /// Fixed means are available immediately; banded means are all zero until
    /// the first [`Bandit::reset`].
    pub fn new(config: &BanditConfig) -> Result<Self> {
        let (k, m) = (config.arms, config.fidelities);
        if k == 0 {
            return Err(MfbError::config("bandit needs at least one arm"));
        }
        if m == 0 {
            return Err(MfbError::config("bandit needs at least one fidelity"));
        }
        validate_costs(&config.costs, m)?;
        let zeta = config.zeta.to_matrix(k, m)?;
        config.noise.validate()?;

        let source = match &config.means {
            MeanModel::Fixed { means } => MeanSource::Fixed(fixed_means(means, k, m)?),
            MeanModel::Banded { top: TopMeans::Grid } => MeanSource::Grid,
            MeanModel::Banded {
                top:
                    TopMeans::Normal {
                        mean,
                        std_dev,
                        sorted,
                    },
            } => {
                if !mean.is_finite() {
                    return Err(MfbError::config(format!(
                        "top-fidelity mean must be finite, got {mean}"
                    )));
                }
                let dist = Normal::new(*mean, *std_dev).map_err(|e| {
                    MfbError::config(format!("invalid top-fidelity mean distribution: {e}"))
                })?;
                MeanSource::Normal {
                    dist,
                    sorted: *sorted,
                }
            }
        };

        let means = match &source {
            MeanSource::Fixed(means) => {
                warn_outside_band(means, &zeta);
                if matches!(config.noise, RewardNoise::Bernoulli)
                    && means.iter().any(|p| !(0.0..=1.0).contains(p))
                {
                    warn!("Bernoulli bandit has means outside [0, 1]; they will be clamped");
                }
                means.clone()
            }
            _ => Array2::zeros((k, m)),
        };
        let optimal = optimal_action(&means);

        Ok(Self {
            k,
            m,
            costs: config.costs.clone(),
            zeta,
            source,
            noise: config.noise,
            means,
            optimal,
        })
    }

    /// Draw a fresh ground-truth matrix and recompute the optimal action
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let top = self.m - 1;
        let top_means: Array1<f64> = match &self.source {
            MeanSource::Fixed(means) => {
                self.means.assign(means);
                self.optimal = optimal_action(&self.means);
                return;
            }
            MeanSource::Grid => Array1::linspace(0.0, 1.0, self.k),
            MeanSource::Normal { dist, sorted } => {
                let mut draws: Vec<f64> = (0..self.k).map(|_| dist.sample(rng)).collect();
                if *sorted {
                    draws.sort_by(f64::total_cmp);
                }
                Array1::from(draws)
            }
        };

        for arm in 0..self.k {
            let centre = top_means[arm];
            self.means[[arm, top]] = centre;
            for fidelity in 0..top {
                let z = self.zeta[[arm, fidelity]];
                self.means[[arm, fidelity]] = if z > 0.0 {
                    rng.gen_range(centre - z..=centre + z)
                } else {
                    centre
                };
            }
        }
        self.optimal = optimal_action(&self.means);
        debug!(optimal = %self.optimal, mean = self.optimal_mean(), "Bandit reset");
    }

    /// Sample a reward for `action`; the flag reports whether it was the optimal action.
    ///
    /// Pulls never mutate the bandit, so repeated pulls are independent draws.
    pub fn pull<R: Rng + ?Sized>(&self, action: Action, rng: &mut R) -> Result<(Reward, bool)> {
        action.validate(self.k, self.m)?;
        let mean = self.means[[action.arm, action.fidelity]];
        Ok((self.noise.sample(mean, rng), action == self.optimal))
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

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    pub fn cost(&self, fidelity: usize) -> f64 {
        self.costs[fidelity]
    }

    /// Cheapest fidelity cost
    pub fn min_cost(&self) -> f64 {
        self.costs.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn zeta(&self) -> &Array2<f64> {
        &self.zeta
    }

    /// Ground-truth means (runner only)
    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    pub fn optimal(&self) -> Action {
        self.optimal
    }

    pub fn optimal_mean(&self) -> f64 {
        self.means[[self.optimal.arm, self.optimal.fidelity]]
    }

    /// True mean of `arm` at the top fidelity
    pub fn top_mean(&self, arm: usize) -> f64 {
        self.means[[arm, self.m - 1]]
    }
}

fn validate_costs(costs: &[f64], fidelities: usize) -> Result<()> {
    if costs.len() != fidelities {
        return Err(MfbError::config(format!(
            "expected {fidelities} fidelity costs, got {}",
            costs.len()
        )));
    }
    if let Some(bad) = costs.iter().find(|c| !c.is_finite() || **c < 0.0) {
        return Err(MfbError::config(format!(
            "fidelity costs must be finite and >= 0, got {bad}"
        )));
    }
    if costs.windows(2).any(|w| w[1] < w[0]) {
        warn!(?costs, "Fidelity costs are not non-decreasing; MF-UCB assumes they are");
    }
    Ok(())
}

fn fixed_means(rows: &[Vec<f64>], arms: usize, fidelities: usize) -> Result<Array2<f64>> {
    if rows.len() != arms || rows.iter().any(|r| r.len() != fidelities) {
        return Err(MfbError::config(format!(
            "fixed means must be a {arms} x {fidelities} matrix"
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    if flat.iter().any(|v| !v.is_finite()) {
        return Err(MfbError::config("fixed means must be finite"));
    }
    Array2::from_shape_vec((arms, fidelities), flat)
        .map_err(|e| MfbError::config(format!("fixed means: {e}")))
}

fn warn_outside_band(means: &Array2<f64>, zeta: &Array2<f64>) {
    let top = means.ncols() - 1;
    for (arm, row) in means.outer_iter().enumerate() {
        for fidelity in 0..top {
            let gap = (row[fidelity] - row[top]).abs();
            if gap > zeta[[arm, fidelity]] + 1e-12 {
                warn!(
                    arm,
                    fidelity,
                    gap,
                    zeta = zeta[[arm, fidelity]],
                    "Fixed mean lies outside its zeta band"
                );
            }
        }
    }
}

/// Best arm at the top fidelity; the lowest index wins a tie
fn optimal_action(means: &Array2<f64>) -> Action {
    let top = means.ncols() - 1;
    let mut best = 0;
    for arm in 1..means.nrows() {
        if means[[arm, top]] > means[[best, top]] {
            best = arm;
        }
    }
    Action::new(best, top)
}

//! Per-repetition outcomes and aggregated run reports

use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Serialize, Serializer};

use mfb_core::{Action, MfbError, Result, RunId};

/// Why a repetition stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Not even the cheapest fidelity fits in the remaining budget
    BudgetExhausted,
    /// A chosen action was unaffordable and the downgrade walk spent what was left
    DowngradeExhausted,
    /// The adaptive step cap was hit
    StepLimit,
}

/// Everything one repetition produced
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionOutcome {
    pub seed: u64,
    /// Committed plays per (arm, fidelity)
    pub plays: Array2<u64>,
    pub regret: f64,
    pub spend: f64,
    pub pulls: u64,
    pub optimal_pulls: u64,
    pub optimal: Action,
    pub termination: Termination,
}

impl RepetitionOutcome {
    /// Fraction of committed pulls that hit the optimal action
    pub fn optimal_fraction(&self) -> f64 {
        if self.pulls == 0 {
            0.0
        } else {
            self.optimal_pulls as f64 / self.pulls as f64
        }
    }

    /// Cost of the committed plays recomputed from the play counts
    pub fn realized_cost(&self, costs: &[f64]) -> f64 {
        self.plays
            .indexed_iter()
            .map(|((_, fidelity), n)| *n as f64 * costs[fidelity])
            .sum()
    }
}

/// Compact per-repetition line in a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepetitionSummary {
    pub seed: u64,
    pub regret: f64,
    pub spend: f64,
    pub pulls: u64,
    pub optimal_pulls: u64,
    pub optimal: Action,
    pub termination: Termination,
}

impl From<&RepetitionOutcome> for RepetitionSummary {
    fn from(outcome: &RepetitionOutcome) -> Self {
        Self {
            seed: outcome.seed,
            regret: outcome.regret,
            spend: outcome.spend,
            pulls: outcome.pulls,
            optimal_pulls: outcome.optimal_pulls,
            optimal: outcome.optimal,
            termination: outcome.termination,
        }
    }
}

/// Averages over all repetitions of one (bandit, policy, budget) configuration
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    pub label: String,
    pub policy: String,
    pub policy_params: serde_json::Value,
    pub budget: f64,
    pub experiments: usize,
    pub seed: u64,
    /// Mean committed plays per (arm, fidelity)
    #[serde(serialize_with = "serialize_rows")]
    pub plays: Array2<f64>,
    pub regret: f64,
    pub optimal_fraction: f64,
    pub spend: f64,
    pub repetitions: Vec<RepetitionSummary>,
}

/// Identifies the configuration a report belongs to
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub label: String,
    pub policy: String,
    pub policy_params: serde_json::Value,
    pub budget: f64,
    pub seed: u64,
}

impl RunReport {
    /// Sum-then-divide merge; outcomes are folded in the order given
    pub fn aggregate(context: ReportContext, outcomes: &[RepetitionOutcome]) -> Result<Self> {
        let first = outcomes
            .first()
            .ok_or_else(|| MfbError::Simulation("no repetitions to aggregate".to_string()))?;
        let n = outcomes.len() as f64;

        let mut plays = Array2::<f64>::zeros(first.plays.dim());
        let (mut regret, mut optimal_fraction, mut spend) = (0.0, 0.0, 0.0);
        for outcome in outcomes {
            plays.zip_mut_with(&outcome.plays, |acc, p| *acc += *p as f64);
            regret += outcome.regret;
            optimal_fraction += outcome.optimal_fraction();
            spend += outcome.spend;
        }
        plays.mapv_inplace(|p| p / n);

        Ok(Self {
            run_id: RunId::new(),
            generated_at: Utc::now(),
            label: context.label,
            policy: context.policy,
            policy_params: context.policy_params,
            budget: context.budget,
            experiments: outcomes.len(),
            seed: context.seed,
            plays,
            regret: regret / n,
            optimal_fraction: optimal_fraction / n,
            spend: spend / n,
            repetitions: outcomes.iter().map(RepetitionSummary::from).collect(),
        })
    }

    /// Mean plays summed over arms, one entry per fidelity
    pub fn plays_per_fidelity(&self) -> Vec<f64> {
        self.plays.columns().into_iter().map(|c| c.sum()).collect()
    }

    pub fn total_plays(&self) -> f64 {
        self.plays.sum()
    }
}

/// Write reports as one pretty-printed JSON array
pub fn write_reports(path: &Path, reports: &[RunReport]) -> Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn serialize_rows<S: Serializer>(
    matrix: &Array2<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let rows: Vec<Vec<f64>> = matrix.outer_iter().map(|row| row.to_vec()).collect();
    rows.serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn create_test_outcome(
        seed: u64,
        plays: Array2<u64>,
        regret: f64,
        optimal_pulls: u64,
    ) -> RepetitionOutcome {
        let pulls = plays.sum();
        RepetitionOutcome {
            seed,
            plays,
            regret,
            spend: 10.0,
            pulls,
            optimal_pulls,
            optimal: Action::new(1, 1),
            termination: Termination::BudgetExhausted,
        }
    }

    fn create_test_context() -> ReportContext {
        ReportContext {
            label: "test".to_string(),
            policy: "mf_ucb".to_string(),
            policy_params: serde_json::json!({"kind": "mf_ucb"}),
            budget: 100.0,
            seed: 7,
        }
    }

    #[test]
    fn test_optimal_fraction() {
        let outcome = create_test_outcome(1, arr2(&[[1, 1], [0, 2]]), 0.0, 2);
        assert_eq!(outcome.optimal_fraction(), 0.5);

        let empty = create_test_outcome(1, arr2(&[[0, 0]]), 0.0, 0);
        assert_eq!(empty.optimal_fraction(), 0.0);
    }

    #[test]
    fn test_realized_cost() {
        let outcome = create_test_outcome(1, arr2(&[[3, 1], [2, 2]]), 0.0, 0);
        assert_eq!(outcome.realized_cost(&[1.0, 10.0]), 35.0);
    }

    #[test]
    fn test_aggregate_averages() {
        let outcomes = vec![
            create_test_outcome(1, arr2(&[[2, 0], [0, 4]]), 10.0, 4),
            create_test_outcome(2, arr2(&[[0, 2], [2, 0]]), 20.0, 0),
        ];
        let report = RunReport::aggregate(create_test_context(), &outcomes).unwrap();

        assert_eq!(report.experiments, 2);
        assert_eq!(report.plays, arr2(&[[1.0, 1.0], [1.0, 2.0]]));
        assert_eq!(report.regret, 15.0);
        // (4/6 + 0/4) / 2
        assert!((report.optimal_fraction - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.spend, 10.0);
        assert_eq!(report.plays_per_fidelity(), vec![2.0, 3.0]);
        assert_eq!(report.total_plays(), 5.0);
        assert_eq!(report.repetitions.len(), 2);
        assert_eq!(report.repetitions[1].seed, 2);
    }

    #[test]
    fn test_aggregate_empty_fails() {
        assert!(RunReport::aggregate(create_test_context(), &[]).is_err());
    }

    #[test]
    fn test_write_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.json");
        let outcomes = vec![create_test_outcome(1, arr2(&[[2, 0], [0, 4]]), 10.0, 4)];
        let report = RunReport::aggregate(create_test_context(), &outcomes).unwrap();
        write_reports(&path, &[report]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["label"], "test");

        let missing = dir.path().join("no-such-dir").join("reports.json");
        assert!(matches!(write_reports(&missing, &[]), Err(MfbError::Io(_))));
    }

    #[test]
    fn test_report_serialization() {
        let outcomes = vec![create_test_outcome(1, arr2(&[[2, 0], [0, 4]]), 10.0, 4)];
        let report = RunReport::aggregate(create_test_context(), &outcomes).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["plays"], serde_json::json!([[2.0, 0.0], [0.0, 4.0]]));
        assert_eq!(json["policy"], "mf_ucb");
        assert_eq!(json["repetitions"][0]["termination"], "budget_exhausted");
        assert_eq!(json["repetitions"][0]["optimal"]["arm"], 1);
    }
}

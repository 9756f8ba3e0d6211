//! Integration tests for the mfbandit simulator
//!
//! These drive whole repetitions and runs through the public API and check
//! the properties the runner guarantees regardless of policy.

#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]
#![allow(clippy::cast_precision_loss)]

use mfb_sim::{
    Agent, Bandit, BanditConfig, Environment, MeanModel, Policy, RewardNoise, TopMeans,
    UcbParams, ZetaConfig,
};

fn all_policies() -> Vec<Policy> {
    vec![
        Policy::Greedy,
        Policy::EpsilonGreedy { epsilon: 0.1 },
        Policy::Ucb(UcbParams::default()),
        Policy::MfUcb(UcbParams::default()),
    ]
}

fn create_test_env(config: &BanditConfig, policy: Policy) -> Environment {
    let bandit = Bandit::new(config).unwrap();
    let agent = Agent::new(&bandit, policy).unwrap();
    Environment::new(bandit, agent, policy.name())
}

/// Four arms, three fidelities, fixed means inside a band around the top
fn create_fixed_config(zeta: Vec<f64>) -> BanditConfig {
    BanditConfig {
        arms: 4,
        fidelities: 3,
        costs: vec![1.0, 10.0, 100.0],
        zeta: ZetaConfig::PerFidelity(zeta),
        means: MeanModel::Fixed {
            means: vec![
                vec![0.15, 0.12, 0.1],
                vec![0.35, 0.32, 0.3],
                vec![0.75, 0.72, 0.7],
                vec![0.55, 0.52, 0.5],
            ],
        },
        noise: RewardNoise::Gaussian { std_dev: 0.1 },
    }
}

/// Cost of pulling every arm once per warm-start fidelity
fn warm_start_cost(env: &Environment) -> f64 {
    let bandit = env.bandit();
    let per_arm: f64 = match env.agent().policy() {
        Policy::Ucb(_) => bandit.cost(bandit.top_fidelity()),
        _ => bandit.costs().iter().sum(),
    };
    per_arm * bandit.k() as f64
}

#[test]
fn test_single_action_always_optimal() {
    let config = BanditConfig {
        arms: 1,
        fidelities: 1,
        costs: vec![1.0],
        zeta: ZetaConfig::PerFidelity(vec![]),
        means: MeanModel::Fixed {
            means: vec![vec![0.4]],
        },
        noise: RewardNoise::Gaussian { std_dev: 1.0 },
    };

    for policy in [Policy::Ucb(UcbParams::default()), Policy::MfUcb(UcbParams::default())] {
        let mut env = create_test_env(&config, policy);
        let report = env.run(50.0, 5, 3).unwrap();
        assert_eq!(report.optimal_fraction, 1.0, "{}", policy.name());
        assert_eq!(report.total_plays(), 50.0);
        assert!(report.regret.abs() < 1e-9);
    }
}

#[test]
fn test_runs_are_reproducible() {
    let config = BanditConfig::default();
    for policy in all_policies() {
        let first = create_test_env(&config, policy).run(3000.0, 4, 42).unwrap();
        let second = create_test_env(&config, policy).run(3000.0, 4, 42).unwrap();

        assert_eq!(first.plays, second.plays, "{}", policy.name());
        assert_eq!(first.regret.to_bits(), second.regret.to_bits());
        assert_eq!(first.optimal_fraction.to_bits(), second.optimal_fraction.to_bits());
        assert_ne!(first.run_id, second.run_id);
    }
}

#[tokio::test]
async fn test_parallel_run_matches_sequential() {
    let config = BanditConfig::default();
    let env = create_test_env(&config, Policy::MfUcb(UcbParams::default()));

    let parallel = env.run_parallel(2500.0, 6, 9, 3).await.unwrap();
    let sequential = env.clone().run(2500.0, 6, 9).unwrap();

    assert_eq!(parallel.plays, sequential.plays);
    assert_eq!(parallel.regret.to_bits(), sequential.regret.to_bits());
    assert_eq!(parallel.spend, sequential.spend);
    let seeds = |r: &mfb_sim::RunReport| r.repetitions.iter().map(|s| s.seed).collect::<Vec<_>>();
    assert_eq!(seeds(&parallel), seeds(&sequential));
}

#[tokio::test]
async fn test_parallel_run_rejects_zero_experiments() {
    let env = create_test_env(&BanditConfig::default(), Policy::Greedy);
    assert!(env.run_parallel(100.0, 0, 1, 2).await.is_err());
}

#[test]
fn test_spend_never_exceeds_budget_after_warm_start() {
    let config = BanditConfig::default();
    for policy in all_policies() {
        for budget in [0.0, 50.0, 1200.0, 4000.0] {
            let mut env = create_test_env(&config, policy);
            let floor = warm_start_cost(&env);
            for seed in 0..3 {
                let outcome = env.run_repetition(budget, seed).unwrap();
                assert!(
                    outcome.spend <= budget.max(floor) + 1e-9,
                    "{} spent {} of {}",
                    policy.name(),
                    outcome.spend,
                    budget
                );
                let realized = outcome.realized_cost(env.bandit().costs());
                assert!((realized - outcome.spend).abs() < 1e-6);
            }
        }
    }
}

#[test]
fn test_warm_start_plays_each_action_once() {
    let config = create_fixed_config(vec![0.2, 0.1]);
    let mut env = create_test_env(&config, Policy::MfUcb(UcbParams::default()));

    // Budget below the warm-start cost: only forced plays happen.
    let outcome = env.run_repetition(100.0, 5).unwrap();
    assert!(outcome.plays.iter().all(|n| *n == 1));
    assert_eq!(outcome.spend, 444.0);
}

#[test]
fn test_zero_zeta_never_leaves_cheapest_fidelity() {
    let config = create_fixed_config(vec![0.0, 0.0]);
    let mut env = create_test_env(&config, Policy::MfUcb(UcbParams::default()));

    let outcome = env.run_repetition(2000.0, 8).unwrap();
    assert_eq!(outcome.plays.column(1).sum(), 4);
    assert_eq!(outcome.plays.column(2).sum(), 4);
    assert!(outcome.plays.column(0).sum() > 1000);
}

#[test]
fn test_wide_zeta_escalates_to_top_fidelity() {
    let config = create_fixed_config(vec![5.0, 5.0]);
    let mut env = create_test_env(&config, Policy::MfUcb(UcbParams::default()));

    let outcome = env.run_repetition(5000.0, 8).unwrap();
    assert!(outcome.plays.column(2).sum() > 4);
}

#[test]
fn test_mf_ucb_plays_more_than_ucb() {
    let config = create_fixed_config(vec![0.2, 0.1]);
    let mf = create_test_env(&config, Policy::MfUcb(UcbParams::default()))
        .run(10_000.0, 3, 1)
        .unwrap();
    let ucb = create_test_env(&config, Policy::Ucb(UcbParams::default()))
        .run(10_000.0, 3, 1)
        .unwrap();

    assert!(ucb.total_plays() <= 100.0);
    assert!(mf.total_plays() > ucb.total_plays());
    assert_eq!(ucb.plays_per_fidelity()[0], 0.0);
}

#[test]
fn test_regret_matches_play_counts() {
    let config = create_fixed_config(vec![0.2, 0.1]);
    let mut env = create_test_env(&config, Policy::EpsilonGreedy { epsilon: 0.2 });
    let outcome = env.run_repetition(3000.0, 21).unwrap();

    let bandit = env.bandit();
    let charged: f64 = outcome
        .plays
        .indexed_iter()
        .map(|((arm, f), n)| *n as f64 * bandit.cost(f) * bandit.top_mean(arm))
        .sum();
    let expected = 3000.0 * bandit.optimal_mean() - charged;
    assert!((outcome.regret - expected).abs() < 1e-6);
}

#[test]
fn test_bernoulli_estimates_stay_in_unit_interval() {
    let config = BanditConfig {
        arms: 5,
        fidelities: 2,
        costs: vec![1.0, 5.0],
        zeta: ZetaConfig::PerFidelity(vec![0.1]),
        means: MeanModel::Banded {
            top: TopMeans::Grid,
        },
        noise: RewardNoise::Bernoulli,
    };
    let mut env = create_test_env(&config, Policy::MfUcb(UcbParams::default()));
    env.run_repetition(800.0, 2).unwrap();

    assert!(env
        .agent()
        .value_estimates()
        .iter()
        .all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_report_serializes_per_arm_rows() {
    let config = create_fixed_config(vec![0.2, 0.1]);
    let report = create_test_env(&config, Policy::MfUcb(UcbParams::default()))
        .run(1000.0, 2, 4)
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["plays"].as_array().unwrap().len(), 4);
    assert_eq!(json["plays"][0].as_array().unwrap().len(), 3);
    assert_eq!(json["policy"], "mf_ucb");
    assert_eq!(json["experiments"], 2);
}

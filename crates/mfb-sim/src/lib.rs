//! mfbandit simulator - multi-fidelity multi-armed bandits under a cost budget
//!
//! This crate provides the reward oracle ([`Bandit`]), the value-estimating
//! [`Agent`], the selection [`Policy`] set (Greedy, Epsilon-Greedy, UCB and
//! MF-UCB) and the budget-constrained experiment runner ([`Environment`]).

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod agent;
pub mod bandit;
pub mod environment;
pub mod policy;
pub mod report;

pub use agent::{Agent, StepSize};
pub use bandit::{Bandit, BanditConfig, MeanModel, RewardNoise, TopMeans, ZetaConfig};
pub use environment::{Environment, DEFAULT_MAX_STEPS};
pub use policy::{Policy, PsiInv, UcbParams, WarmStart};
pub use report::{
    write_reports, RepetitionOutcome, RepetitionSummary, ReportContext, RunReport, Termination,
};

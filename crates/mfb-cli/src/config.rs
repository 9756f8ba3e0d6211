//! Configuration loading for the mfb CLI

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{ConfigBuilder, Environment as EnvSource, File};
use serde::{Deserialize, Serialize};

use mfb_sim::{Agent, Bandit, BanditConfig, Environment, Policy, StepSize, UcbParams};

/// Configuration for an experiment batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub experiment: ExperimentConfig,
    pub bandit: BanditConfig,
    pub policies: Vec<PolicyConfig>,
    pub logging: LoggingConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub label: String,
    pub budget: f64,
    /// Budgets used by `mfb sweep` when none are given on the command line
    pub budgets: Vec<f64>,
    pub experiments: usize,
    pub seed: u64,
    pub workers: usize,
    pub max_steps: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            label: "mfb".to_string(),
            budget: 10_000.0,
            budgets: vec![1_000.0, 5_000.0, 10_000.0, 50_000.0],
            experiments: 100,
            seed: 0,
            workers: 4,
            max_steps: mfb_sim::DEFAULT_MAX_STEPS,
        }
    }
}

/// One policy to evaluate against the configured bandit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Display label, defaults to the policy name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub policy: Policy,
    /// Initial value estimate for every action
    pub prior: f64,
    pub step_size: StepSize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            label: None,
            policy: Policy::MfUcb(UcbParams::default()),
            prior: 0.0,
            step_size: StepSize::default(),
        }
    }
}

impl PolicyConfig {
    fn new(policy: Policy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or_else(|| self.policy.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            bandit: BanditConfig::default(),
            policies: vec![
                PolicyConfig::new(Policy::Greedy),
                PolicyConfig::new(Policy::EpsilonGreedy { epsilon: 0.1 }),
                PolicyConfig::new(Policy::Ucb(UcbParams::default())),
                PolicyConfig::new(Policy::MfUcb(UcbParams::default())),
            ],
            logging: LoggingConfig::default(),
            source: None,
        }
    }
}

impl Config {
    /// Load configuration from a file and `MFB__` environment variables.
    ///
    /// An explicit `path` must exist; otherwise the usual locations are searched.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) if !path.exists() => bail!("config file not found: {}", path.display()),
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_config_file(),
        };

        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = &config_path {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        // MFB__EXPERIMENT__BUDGET=500 overrides experiment.budget
        builder = builder.add_source(
            EnvSource::with_prefix("MFB")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.source = config_path;
        Ok(config)
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: MFB_CONFIG env, ./mfb.toml, ~/.config/mfb/mfb.toml
        if let Ok(path) = std::env::var("MFB_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("mfb.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("mfb").join("mfb.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// One environment per configured policy, all sharing the bandit setup
    pub fn environments(&self) -> Result<Vec<Environment>> {
        if self.policies.is_empty() {
            bail!("no policies configured");
        }
        let bandit = Bandit::new(&self.bandit).context("Invalid bandit configuration")?;

        self.policies
            .iter()
            .map(|p| {
                let agent = Agent::new(&bandit, p.policy)
                    .and_then(|agent| agent.with_prior(p.prior))
                    .and_then(|agent| agent.with_step_size(p.step_size))
                    .with_context(|| format!("Invalid policy configuration '{}'", p.label()))?;
                let label = format!("{}/{}", self.experiment.label, p.label());
                Ok(Environment::new(bandit.clone(), agent, label)
                    .with_max_steps(self.experiment.max_steps))
            })
            .collect()
    }
}

//! Error types for mfbandit

use thiserror::Error;

/// Main error type for mfbandit
#[derive(Error, Debug)]
pub enum MfbError {
    /// Invalid arm/fidelity counts, cost vectors, zeta bounds or hyperparameters.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid action (arm {arm}, fidelity {fidelity}) for a bandit with {arms} arms and {fidelities} fidelities")]
    InvalidAction {
        arm: usize,
        fidelity: usize,
        arms: usize,
        fidelities: usize,
    },

    #[error("observe called before any action was chosen")]
    NoActionRecorded,

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MfbError {
    /// Shorthand for building a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for mfbandit operations
pub type Result<T> = std::result::Result<T, MfbError>;

//! Common types used throughout mfbandit

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MfbError, Result};

/// Reward value returned by a pull
pub type Reward = f64;

/// Identifier attached to every experiment report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An (arm, fidelity) pair: the unit of selection and cost accounting.
///
/// Fidelities are ordered from cheapest/noisiest (0) to the most expensive and
/// accurate (`m - 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Action {
    pub arm: usize,
    pub fidelity: usize,
}

impl Action {
    pub fn new(arm: usize, fidelity: usize) -> Self {
        Self { arm, fidelity }
    }

    /// Check the action against a `arms x fidelities` action space
    pub fn validate(&self, arms: usize, fidelities: usize) -> Result<()> {
        if self.arm < arms && self.fidelity < fidelities {
            Ok(())
        } else {
            Err(MfbError::InvalidAction {
                arm: self.arm,
                fidelity: self.fidelity,
                arms,
                fidelities,
            })
        }
    }

    /// Action at row-major position `index` of a `_ x fidelities` table
    pub fn from_index(index: usize, fidelities: usize) -> Self {
        Self {
            arm: index / fidelities,
            fidelity: index % fidelities,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "arm {} @ fidelity {}", self.arm, self.fidelity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_validate_in_range() {
        assert!(Action::new(0, 0).validate(1, 1).is_ok());
        assert!(Action::new(4, 2).validate(5, 3).is_ok());
    }

    #[test]
    fn test_action_validate_out_of_range() {
        let err = Action::new(5, 0).validate(5, 3).unwrap_err();
        assert!(matches!(
            err,
            MfbError::InvalidAction {
                arm: 5,
                fidelity: 0,
                arms: 5,
                fidelities: 3
            }
        ));
        assert!(Action::new(0, 3).validate(5, 3).is_err());
    }

    #[test]
    fn test_action_index_mapping() {
        assert_eq!(Action::from_index(7, 3), Action::new(2, 1));
        assert_eq!(Action::from_index(0, 3), Action::new(0, 0));
    }

    #[test]
    fn test_action_serialization() {
        let action = Action::new(3, 2);
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"arm":3,"fidelity":2}"#);
        let parsed: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn test_run_id_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}

//! Integration tests for error and action types
//! Complements the inline unit tests in src/types.rs

use mfb_core::{Action, MfbError};
use std::collections::HashSet;

#[test]
fn test_invalid_action_message_names_indices() {
    let err = Action::new(7, 1).validate(5, 3).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("arm 7"), "unexpected message: {msg}");
    assert!(msg.contains("5 arms"), "unexpected message: {msg}");
}

#[test]
fn test_config_error_shorthand() {
    let err = MfbError::config("costs must be non-negative");
    assert!(matches!(err, MfbError::Config(_)));
    assert_eq!(
        err.to_string(),
        "Configuration error: costs must be non-negative"
    );
}

#[test]
fn test_io_error_conversion() {
    fn read() -> mfb_core::Result<String> {
        Ok(std::fs::read_to_string("/definitely/not/a/real/path.toml")?)
    }
    assert!(matches!(read(), Err(MfbError::Io(_))));
}

#[test]
fn test_action_index_covers_space_exactly_once() {
    let (arms, fidelities) = (4, 3);
    let mut seen = HashSet::new();
    for index in 0..arms * fidelities {
        let action = Action::from_index(index, fidelities);
        assert!(action.validate(arms, fidelities).is_ok());
        assert!(seen.insert(action), "duplicate action {action}");
    }
    assert_eq!(seen.len(), arms * fidelities);
}

#[test]
fn test_action_ordering_is_arm_major() {
    let mut actions = vec![Action::new(1, 0), Action::new(0, 2), Action::new(0, 1)];
    actions.sort();
    assert_eq!(
        actions,
        vec![Action::new(0, 1), Action::new(0, 2), Action::new(1, 0)]
    );
}

//! mfbandit core - shared types and errors
//!
//! This crate provides the foundational types used by the simulator and the CLI.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{MfbError, Result};
pub use types::{Action, Reward, RunId};

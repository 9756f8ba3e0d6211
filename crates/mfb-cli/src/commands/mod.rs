//! CLI command modules

pub mod config;
pub mod output;
pub mod run;
pub mod sweep;

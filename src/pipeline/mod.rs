// src/pipeline/mod.rs

//! Pipeline entry points for harvester operations.
//!
//! - `run_discovery`: Run configured strategies and fill the frontier
//! - `run_harvest`: Drain the frontier into batch files with checkpoints

pub mod discover;
pub mod harvest;

pub use discover::run_discovery;
pub use harvest::{HarvestStats, run_harvest};

// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the
//! application, organized by their primary purpose.

mod checkpoint;
mod config;
mod record;
mod target;

// Re-export all public types
pub use checkpoint::{Checkpoint, Counters};
pub use config::{Config, DiscoveryConfig, HarvestConfig, HttpConfig, StrategyConfig};
pub use record::{BatchEntry, FailureKind, FailureRecord, Record};
pub use target::{StrategyKind, TargetUrl};

// src/models/checkpoint.rs

//! Durable snapshot of harvest progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::target::TargetUrl;

/// Progress counters carried across checkpoints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Counters {
    /// Records successfully extracted
    pub processed: u64,

    /// URLs that terminally failed (fetch or parse)
    pub failed: u64,
}

/// A snapshot of frontier state, written atomically so a crash mid-write
/// never corrupts the last good checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Discovered but not yet processed targets
    pub pending: Vec<TargetUrl>,

    /// URLs already processed (successfully or terminally failed)
    pub done: Vec<String>,

    /// Progress counters
    pub counters: Counters,

    /// When this snapshot was taken
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(pending: Vec<TargetUrl>, done: Vec<String>, counters: Counters) -> Self {
        Self {
            pending,
            done,
            counters,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyKind;

    #[test]
    fn test_checkpoint_roundtrip() {
        let checkpoint = Checkpoint::new(
            vec![TargetUrl::new("https://example.com/id/3/", StrategyKind::Pagination).unwrap()],
            vec!["https://example.com/id/1/".to_string()],
            Counters {
                processed: 1,
                failed: 0,
            },
        );

        let json = serde_json::to_string(&checkpoint).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();

        assert_eq!(back.pending, checkpoint.pending);
        assert_eq!(back.done, checkpoint.done);
        assert_eq!(back.counters, checkpoint.counters);
    }
}

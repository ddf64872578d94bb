// src/storage/mod.rs

//! Persistence for harvest output and progress.
//!
//! Two kinds of artifact live under one storage root:
//! - Batches: `batches/batch_NNNNNN.json`, append-only files of up to
//!   `batch_size` entries each, written once and never rewritten.
//! - Checkpoint: `checkpoint.json`, the latest frontier snapshot,
//!   replaced atomically on every write.
//!
//! ```text
//! storage/
//! ├── config.toml           # Harvest configuration
//! ├── checkpoint.json       # Latest frontier snapshot
//! └── batches/
//!     ├── batch_000000.json
//!     └── batch_000001.json
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BatchEntry, Checkpoint, Record};

pub use local::LocalStorage;

/// Trait for harvest storage backends.
#[async_trait]
pub trait HarvestStorage: Send + Sync {
    /// Write a batch of entries to the next numbered batch file.
    ///
    /// Returns the file name written.
    async fn flush_batch(&self, entries: &[BatchEntry]) -> Result<String>;

    /// Replace the checkpoint with a new snapshot.
    async fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Load the last checkpoint, if one exists.
    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>>;

    /// List batch file names in index order.
    async fn batch_files(&self) -> Result<Vec<String>>;

    /// Load the entries of one batch file by name.
    async fn load_batch(&self, name: &str) -> Result<Vec<BatchEntry>>;

    /// Write merged records to a named JSON export under the root.
    async fn write_records(&self, name: &str, records: &[Record]) -> Result<()>;
}

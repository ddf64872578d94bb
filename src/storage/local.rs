// src/storage/local.rs

//! Local filesystem storage backend.
//!
//! All writes go through an atomic temp-then-rename so a crash mid-write
//! leaves either the old file or the new one, never a torn file. Batch
//! indices are recovered by scanning the batches directory, so resuming
//! a run continues the numbering where the previous run stopped.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{BatchEntry, Checkpoint, Record};
use crate::storage::HarvestStorage;

const CHECKPOINT_KEY: &str = "checkpoint.json";
const BATCH_DIR: &str = "batches";

/// Local filesystem storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Sorted batch file names currently on disk.
    async fn scan_batches(&self) -> Result<Vec<String>> {
        let dir = self.path(BATCH_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("batch_") && name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Index of the next batch file to write.
    async fn next_batch_index(&self) -> Result<u32> {
        let names = self.scan_batches().await?;
        let last = names
            .iter()
            .filter_map(|name| {
                name.strip_prefix("batch_")?
                    .strip_suffix(".json")?
                    .parse::<u32>()
                    .ok()
            })
            .max();
        Ok(last.map_or(0, |n| n + 1))
    }

    fn batch_key(index: u32) -> String {
        format!("{BATCH_DIR}/batch_{index:06}.json")
    }
}

#[async_trait]
impl HarvestStorage for LocalStorage {
    async fn flush_batch(&self, entries: &[BatchEntry]) -> Result<String> {
        let index = self.next_batch_index().await?;
        let key = Self::batch_key(index);
        self.write_json(&key, entries).await.map_err(|e| {
            AppError::persistence(format!("writing {key}"), e.to_string())
        })?;
        log::info!("wrote {} entries to {key}", entries.len());
        Ok(key)
    }

    async fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.write_json(CHECKPOINT_KEY, checkpoint)
            .await
            .map_err(|e| AppError::persistence("writing checkpoint", e.to_string()))?;
        log::debug!(
            "checkpoint written: {} pending, {} done",
            checkpoint.pending.len(),
            checkpoint.done.len()
        );
        Ok(())
    }

    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>> {
        self.read_json(CHECKPOINT_KEY).await
    }

    async fn batch_files(&self) -> Result<Vec<String>> {
        self.scan_batches().await
    }

    async fn load_batch(&self, name: &str) -> Result<Vec<BatchEntry>> {
        let key = format!("{BATCH_DIR}/{name}");
        Ok(self.read_json(&key).await?.unwrap_or_default())
    }

    async fn write_records(&self, name: &str, records: &[Record]) -> Result<()> {
        self.write_json(name, records)
            .await
            .map_err(|e| AppError::persistence(format!("writing {name}"), e.to_string()))?;
        log::info!("wrote {} records to {name}", records.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Counters, Record, StrategyKind, TargetUrl};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(id: u64) -> BatchEntry {
        BatchEntry::Record(Record {
            id: id.to_string(),
            fields: BTreeMap::from([("title".to_string(), format!("copy {id}"))]),
            source_url: format!("https://example.com/copira/id/{id}/"),
            fetched_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_checkpoint().await.unwrap().is_none());

        let checkpoint = Checkpoint::new(
            vec![TargetUrl::new("https://example.com/id/2/", StrategyKind::Pagination).unwrap()],
            vec!["https://example.com/id/1/".to_string()],
            Counters {
                processed: 1,
                failed: 0,
            },
        );
        storage.write_checkpoint(&checkpoint).await.unwrap();

        let loaded = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(loaded.pending, checkpoint.pending);
        assert_eq!(loaded.done, checkpoint.done);

        // No stray temp file left behind
        assert!(!tmp.path().join("checkpoint.tmp").exists());
    }

    #[tokio::test]
    async fn test_batch_numbering_is_sequential() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let first = storage.flush_batch(&[record(1), record(2)]).await.unwrap();
        let second = storage.flush_batch(&[record(3)]).await.unwrap();

        assert_eq!(first, "batches/batch_000000.json");
        assert_eq!(second, "batches/batch_000001.json");

        let files = storage.batch_files().await.unwrap();
        assert_eq!(files, vec!["batch_000000.json", "batch_000001.json"]);
    }

    #[tokio::test]
    async fn test_batch_numbering_resumes_after_restart() {
        let tmp = TempDir::new().unwrap();
        {
            let storage = LocalStorage::new(tmp.path());
            storage.flush_batch(&[record(1)]).await.unwrap();
        }

        let storage = LocalStorage::new(tmp.path());
        let key = storage.flush_batch(&[record(2)]).await.unwrap();
        assert_eq!(key, "batches/batch_000001.json");
    }

    #[tokio::test]
    async fn test_write_records_is_atomic_json() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let records = vec![Record {
            id: "7".to_string(),
            fields: BTreeMap::from([("title".to_string(), "copy 7".to_string())]),
            source_url: "https://example.com/copira/id/7/".to_string(),
            fetched_at: Utc::now(),
        }];
        storage.write_records("records.json", &records).await.unwrap();

        let bytes = std::fs::read(tmp.path().join("records.json")).unwrap();
        let back: Vec<Record> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].id, "7");

        // Temp-then-rename leaves no intermediate file
        assert!(!tmp.path().join("records.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_batch() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.flush_batch(&[record(7), record(8)]).await.unwrap();
        let entries = storage.load_batch("batch_000000.json").await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url(), "https://example.com/copira/id/7/");
    }
}

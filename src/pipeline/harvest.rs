// src/pipeline/harvest.rs

//! Harvest orchestration.
//!
//! Drains the frontier in chunks. Each chunk is fetched through a bounded
//! worker pool, its outcomes are persisted to batch files, and only then
//! is completion recorded and a checkpoint written. A URL is never marked
//! done in a checkpoint before the entry it produced is on disk, so a
//! crash between chunks redoes at most one chunk of work.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::{StreamExt, stream};

use crate::error::Result;
use crate::extract::Extractor;
use crate::fetch::FetchClient;
use crate::frontier::Frontier;
use crate::models::{
    BatchEntry, Checkpoint, Config, Counters, FailureKind, FailureRecord, TargetUrl,
};
use crate::storage::HarvestStorage;

/// What one harvest run accomplished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HarvestStats {
    /// Records extracted this run
    pub processed: u64,

    /// URLs that terminally failed this run
    pub failed: u64,

    /// Whether the run ended on the stop flag rather than an empty frontier
    pub stopped: bool,
}

/// Outcome of processing one taken target.
enum UrlOutcome {
    /// Terminal outcome to persist; `success` selects the counter
    Done {
        target: TargetUrl,
        entry: BatchEntry,
        success: bool,
    },
    /// Never attempted; goes back to the frontier
    Cancelled(TargetUrl),
}

/// Drain the frontier until empty or stopped.
///
/// `counters` carries totals from a previous run so resumed checkpoints
/// keep counting from where they left off.
pub async fn run_harvest(
    config: &Config,
    frontier: &Frontier,
    fetcher: &FetchClient,
    extractor: &Extractor,
    storage: &dyn HarvestStorage,
    stop: &AtomicBool,
    mut counters: Counters,
) -> Result<HarvestStats> {
    let mut stats = HarvestStats::default();
    let mut buffer: Vec<(TargetUrl, BatchEntry, bool)> = Vec::new();

    loop {
        if stop.load(Ordering::Relaxed) {
            stats.stopped = true;
            break;
        }

        let chunk = frontier.take(config.harvest.checkpoint_interval);
        if chunk.is_empty() {
            break;
        }
        log::info!(
            "processing chunk of {} ({} pending after)",
            chunk.len(),
            frontier.pending_len()
        );

        let outcomes: Vec<UrlOutcome> = stream::iter(chunk)
            .map(|target| process_one(target, fetcher, extractor, stop))
            .buffer_unordered(config.http.max_concurrent)
            .collect()
            .await;

        let mut cancelled = Vec::new();
        for outcome in outcomes {
            match outcome {
                UrlOutcome::Done {
                    target,
                    entry,
                    success,
                } => buffer.push((target, entry, success)),
                UrlOutcome::Cancelled(target) => cancelled.push(target),
            }
        }
        if !cancelled.is_empty() {
            stats.stopped = true;
            frontier.release(cancelled);
        }

        // Persist everything from this chunk before recording completion
        while !buffer.is_empty() {
            let take = buffer.len().min(config.harvest.batch_size);
            let batch: Vec<_> = buffer.drain(..take).collect();
            let entries: Vec<BatchEntry> = batch.iter().map(|(_, e, _)| e.clone()).collect();

            if let Err(e) = storage.flush_batch(&entries).await {
                // Unpersisted outcomes go back to pending so the final
                // snapshot still covers them
                frontier.release(
                    batch
                        .into_iter()
                        .chain(buffer.drain(..))
                        .map(|(target, _, _)| target)
                        .collect(),
                );
                write_final_checkpoint(frontier, storage, counters).await;
                return Err(e);
            }

            for (target, _, success) in batch {
                frontier.complete(&target.url);
                if success {
                    counters.processed += 1;
                    stats.processed += 1;
                } else {
                    counters.failed += 1;
                    stats.failed += 1;
                }
            }
        }

        let (pending, done) = frontier.snapshot();
        storage
            .write_checkpoint(&Checkpoint::new(pending, done, counters))
            .await?;

        if stats.stopped {
            break;
        }
    }

    // Final snapshot covers runs that ended without processing a chunk
    let (pending, done) = frontier.snapshot();
    storage
        .write_checkpoint(&Checkpoint::new(pending, done, counters))
        .await?;

    log::info!(
        "harvest finished: {} processed, {} failed, {} pending{}",
        stats.processed,
        stats.failed,
        frontier.pending_len(),
        if stats.stopped { " (stopped)" } else { "" }
    );
    Ok(stats)
}

/// Fetch and extract one target, classifying the result as a terminal
/// outcome. Parse failures are terminal by construction: the page was
/// fetched, so retrying would see the same layout.
async fn process_one(
    target: TargetUrl,
    fetcher: &FetchClient,
    extractor: &Extractor,
    stop: &AtomicBool,
) -> UrlOutcome {
    if stop.load(Ordering::Relaxed) {
        return UrlOutcome::Cancelled(target);
    }

    let (entry, success) = match fetcher.fetch_page(&target.url).await {
        Ok(body) => match extractor.extract(&target.url, &body) {
            Ok(record) => (BatchEntry::Record(record), true),
            Err(e) => {
                log::warn!("extraction failed for {}: {e}", target.url);
                (
                    BatchEntry::Failure(FailureRecord {
                        url: target.url.clone(),
                        kind: FailureKind::Parse,
                        attempts: 1,
                    }),
                    false,
                )
            }
        },
        Err(failure) => {
            log::warn!(
                "fetch failed for {} after {} attempts: {}",
                target.url,
                failure.attempts,
                failure.kind
            );
            (
                BatchEntry::Failure(FailureRecord {
                    url: target.url.clone(),
                    kind: failure.kind,
                    attempts: failure.attempts,
                }),
                false,
            )
        }
    };

    UrlOutcome::Done {
        target,
        entry,
        success,
    }
}

/// Best-effort checkpoint before aborting on a persistence failure.
async fn write_final_checkpoint(
    frontier: &Frontier,
    storage: &dyn HarvestStorage,
    counters: Counters,
) {
    let (pending, done) = frontier.snapshot();
    if let Err(e) = storage
        .write_checkpoint(&Checkpoint::new(pending, done, counters))
        .await
    {
        log::error!("final checkpoint also failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyKind;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DETAIL_BODY: &str = r#"
        <html><body>
        <h1>copy</h1>
        <table><tr><th>広告主</th><td>someone</td></tr></table>
        </body></html>
    "#;

    fn test_config(batch_size: usize, checkpoint_interval: usize) -> Config {
        let mut config = Config::default();
        config.http.request_delay_ms = 0;
        config.http.retry_base_ms = 1;
        config.http.max_retries = 1;
        config.harvest.batch_size = batch_size;
        config.harvest.checkpoint_interval = checkpoint_interval;
        config
    }

    async fn mount_detail(server: &MockServer, id: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/copira/id/{id}/")))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_BODY))
            .mount(server)
            .await;
    }

    fn seed(server: &MockServer, frontier: &Frontier, ids: impl IntoIterator<Item = u64>) {
        frontier.merge(ids.into_iter().map(|id| {
            TargetUrl::new(
                &format!("{}/copira/id/{id}/", server.uri()),
                StrategyKind::Pagination,
            )
            .unwrap()
        }));
    }

    #[tokio::test]
    async fn test_harvest_drains_frontier() {
        let server = MockServer::start().await;
        for id in 1..=5 {
            mount_detail(&server, id).await;
        }

        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = test_config(100, 2);
        let frontier = Frontier::new();
        seed(&server, &frontier, 1..=5);

        let fetcher = FetchClient::new(&config.http).unwrap();
        let extractor = Extractor::new().unwrap();
        let stop = AtomicBool::new(false);

        let stats = run_harvest(
            &config,
            &frontier,
            &fetcher,
            &extractor,
            &storage,
            &stop,
            Counters::default(),
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 5);
        assert_eq!(stats.failed, 0);
        assert!(!stats.stopped);
        assert_eq!(frontier.pending_len(), 0);
        assert_eq!(frontier.done_len(), 5);

        let checkpoint = storage.load_checkpoint().await.unwrap().unwrap();
        assert!(checkpoint.pending.is_empty());
        assert_eq!(checkpoint.done.len(), 5);
        assert_eq!(checkpoint.counters.processed, 5);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_not_lost() {
        let server = MockServer::start().await;
        mount_detail(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/copira/id/2/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = test_config(100, 10);
        let frontier = Frontier::new();
        seed(&server, &frontier, 1..=2);

        let fetcher = FetchClient::new(&config.http).unwrap();
        let extractor = Extractor::new().unwrap();
        let stop = AtomicBool::new(false);

        let stats = run_harvest(
            &config,
            &frontier,
            &fetcher,
            &extractor,
            &storage,
            &stop,
            Counters::default(),
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);

        let entries = storage.load_batch("batch_000000.json").await.unwrap();
        let failures: Vec<_> = entries
            .iter()
            .filter(|e| matches!(e, BatchEntry::Failure(_)))
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].url().ends_with("/copira/id/2/"));

        // Failed URL counts as done; it will not be retried on resume
        assert!(frontier.is_done(failures[0].url()));
    }

    #[tokio::test]
    async fn test_parse_failure_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/copira/id/9/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = test_config(100, 10);
        let frontier = Frontier::new();
        seed(&server, &frontier, [9]);

        let fetcher = FetchClient::new(&config.http).unwrap();
        let extractor = Extractor::new().unwrap();
        let stop = AtomicBool::new(false);

        let stats = run_harvest(
            &config,
            &frontier,
            &fetcher,
            &extractor,
            &storage,
            &stop,
            Counters::default(),
        )
        .await
        .unwrap();

        assert_eq!(stats.failed, 1);
        let entries = storage.load_batch("batch_000000.json").await.unwrap();
        match &entries[0] {
            BatchEntry::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::Parse);
                assert_eq!(failure.attempts, 1);
            }
            other => panic!("expected failure entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_size_bounds_files() {
        let server = MockServer::start().await;
        for id in 1..=7 {
            mount_detail(&server, id).await;
        }

        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = test_config(3, 10);
        let frontier = Frontier::new();
        seed(&server, &frontier, 1..=7);

        let fetcher = FetchClient::new(&config.http).unwrap();
        let extractor = Extractor::new().unwrap();
        let stop = AtomicBool::new(false);

        run_harvest(
            &config,
            &frontier,
            &fetcher,
            &extractor,
            &storage,
            &stop,
            Counters::default(),
        )
        .await
        .unwrap();

        let files = storage.batch_files().await.unwrap();
        let mut total = 0;
        for file in &files {
            let entries = storage.load_batch(file).await.unwrap();
            assert!(entries.len() <= 3);
            total += entries.len();
        }
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn test_stop_before_start_leaves_frontier_intact() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = test_config(100, 10);
        let frontier = Frontier::new();
        seed(&server, &frontier, 1..=4);

        let fetcher = FetchClient::new(&config.http).unwrap();
        let extractor = Extractor::new().unwrap();
        let stop = AtomicBool::new(true);

        let stats = run_harvest(
            &config,
            &frontier,
            &fetcher,
            &extractor,
            &storage,
            &stop,
            Counters::default(),
        )
        .await
        .unwrap();

        assert!(stats.stopped);
        assert_eq!(stats.processed, 0);
        assert_eq!(frontier.pending_len(), 4);

        // A checkpoint still exists so the run can resume
        let checkpoint = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(checkpoint.pending.len(), 4);
    }

    #[tokio::test]
    async fn test_counters_accumulate_across_runs() {
        let server = MockServer::start().await;
        mount_detail(&server, 1).await;

        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let config = test_config(100, 10);
        let frontier = Frontier::new();
        seed(&server, &frontier, [1]);

        let fetcher = FetchClient::new(&config.http).unwrap();
        let extractor = Extractor::new().unwrap();
        let stop = AtomicBool::new(false);

        run_harvest(
            &config,
            &frontier,
            &fetcher,
            &extractor,
            &storage,
            &stop,
            Counters {
                processed: 40,
                failed: 2,
            },
        )
        .await
        .unwrap();

        let checkpoint = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(checkpoint.counters.processed, 41);
        assert_eq!(checkpoint.counters.failed, 2);
    }
}

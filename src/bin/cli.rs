//! Copira Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use copira::{
    discovery::HttpCatalogSource,
    error::Result,
    extract::Extractor,
    fetch::FetchClient,
    frontier::Frontier,
    models::{BatchEntry, Checkpoint, Config, Counters},
    pipeline,
    storage::{HarvestStorage, LocalStorage},
};

/// Copira - TCC Copy Catalog Harvester
#[derive(Parser, Debug)]
#[command(name = "copira", version, about = "Copy catalog harvesting engine")]
struct Cli {
    /// Path to storage directory containing config and output
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover targets and harvest them until done or interrupted
    Harvest {
        /// Re-run discovery even when a checkpoint exists
        #[arg(long)]
        rediscover: bool,
    },

    /// Run discovery only and checkpoint the frontier
    Discover,

    /// Show checkpoint and batch progress
    Status,

    /// Merge all batch records into one JSON file under the storage dir
    Export {
        /// Output file name, relative to the storage directory
        #[arg(long, default_value = "records.json")]
        output: String,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Spawn the interrupt listener; the flag asks workers to wind down.
fn spawn_interrupt_handler(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received. Finishing current chunk, then checkpointing...");
            stop.store(true, Ordering::Relaxed);
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Copira Harvester starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);

    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Harvest { rediscover } => {
            config.validate()?;
            let fetcher = Arc::new(FetchClient::new(&config.http)?);
            let source = HttpCatalogSource::new(Arc::clone(&fetcher), &config)?;
            let extractor = Extractor::new()?;

            let stop = Arc::new(AtomicBool::new(false));
            spawn_interrupt_handler(Arc::clone(&stop));

            let checkpoint = storage.load_checkpoint().await?;
            let (frontier, counters) = match &checkpoint {
                Some(checkpoint) => {
                    log::info!(
                        "Resuming from checkpoint: {} pending, {} done (updated {})",
                        checkpoint.pending.len(),
                        checkpoint.done.len(),
                        checkpoint.updated_at
                    );
                    (Frontier::from_checkpoint(checkpoint), checkpoint.counters)
                }
                None => (Frontier::new(), Counters::default()),
            };

            if checkpoint.is_none() || rediscover {
                let added = pipeline::run_discovery(&config, &source, &frontier, &stop).await?;
                log::info!("Discovery added {} targets", added);

                let (pending, done) = frontier.snapshot();
                storage
                    .write_checkpoint(&Checkpoint::new(pending, done, counters))
                    .await?;
            }

            let stats =
                pipeline::run_harvest(&config, &frontier, &fetcher, &extractor, &storage, &stop, counters)
                    .await?;

            if stats.stopped {
                log::warn!(
                    "Harvest interrupted: {} processed, {} failed, {} still pending",
                    stats.processed,
                    stats.failed,
                    frontier.pending_len()
                );
            } else {
                log::info!(
                    "Harvest complete: {} processed, {} failed",
                    stats.processed,
                    stats.failed
                );
            }
        }

        Command::Discover => {
            config.validate()?;
            let fetcher = Arc::new(FetchClient::new(&config.http)?);
            let source = HttpCatalogSource::new(Arc::clone(&fetcher), &config)?;

            let stop = Arc::new(AtomicBool::new(false));
            spawn_interrupt_handler(Arc::clone(&stop));

            let checkpoint = storage.load_checkpoint().await?;
            let (frontier, counters) = match &checkpoint {
                Some(checkpoint) => (Frontier::from_checkpoint(checkpoint), checkpoint.counters),
                None => (Frontier::new(), Counters::default()),
            };

            let added = pipeline::run_discovery(&config, &source, &frontier, &stop).await?;

            let (pending, done) = frontier.snapshot();
            storage
                .write_checkpoint(&Checkpoint::new(pending, done, counters))
                .await?;

            log::info!(
                "Discovery added {} targets ({} pending total)",
                added,
                frontier.pending_len()
            );
        }

        Command::Status => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            match storage.load_checkpoint().await? {
                Some(checkpoint) => {
                    log::info!(
                        "Checkpoint: {} pending, {} done (updated {})",
                        checkpoint.pending.len(),
                        checkpoint.done.len(),
                        checkpoint.updated_at
                    );
                    log::info!(
                        "Counters: {} processed, {} failed",
                        checkpoint.counters.processed,
                        checkpoint.counters.failed
                    );
                }
                None => log::info!("No checkpoint found yet."),
            }

            let batches = storage.batch_files().await?;
            let mut entries = 0;
            for name in &batches {
                entries += storage.load_batch(name).await?.len();
            }
            log::info!("Batches: {} files, {} entries", batches.len(), entries);
        }

        Command::Export { output } => {
            let mut records = Vec::new();
            let mut failures = 0;
            for name in storage.batch_files().await? {
                for entry in storage.load_batch(&name).await? {
                    match entry {
                        BatchEntry::Record(record) => records.push(record),
                        BatchEntry::Failure(_) => failures += 1,
                    }
                }
            }
            records.sort_by(|a, b| a.id.cmp(&b.id));
            records.dedup_by(|a, b| a.id == b.id);

            storage.write_records(&output, &records).await?;

            log::info!(
                "Exported {} records to {} ({} failures left in batches)",
                records.len(),
                cli.storage_dir.join(&output).display(),
                failures
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK ({} strategies)", config.discovery.strategies.len());
        }
    }

    log::info!("Done!");

    Ok(())
}

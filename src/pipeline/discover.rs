// src/pipeline/discover.rs

//! Discovery orchestration.
//!
//! Runs each configured strategy in order and merges its targets into the
//! frontier. Strategy failures are isolated: one dead year partition does
//! not abort the others.

use std::sync::atomic::AtomicBool;

use crate::discovery::{CatalogSource, ListQuery, WalkLimits, probe_ids, walk_pages};
use crate::error::Result;
use crate::frontier::Frontier;
use crate::models::{Config, StrategyConfig, StrategyKind};

/// Run all configured discovery strategies and merge their targets into
/// the frontier. Returns the number of new targets added.
pub async fn run_discovery(
    config: &Config,
    source: &dyn CatalogSource,
    frontier: &Frontier,
    stop: &AtomicBool,
) -> Result<usize> {
    let limits = WalkLimits {
        empty_threshold: config.discovery.empty_page_threshold,
        max_pages: config.discovery.max_pages_per_walk,
    };
    let mut total_added = 0;

    for strategy in &config.discovery.strategies {
        let added = match strategy {
            StrategyConfig::Pagination {
                start_year,
                end_year,
            } => {
                let query = ListQuery::years(*start_year, *end_year);
                let outcome =
                    walk_pages(source, &query, &limits, StrategyKind::Pagination, stop).await;
                log::info!(
                    "pagination {query}: {} targets over {} pages",
                    outcome.targets.len(),
                    outcome.pages_requested
                );
                frontier.merge(outcome.targets)
            }
            StrategyConfig::YearPartition {
                start_year,
                end_year,
            } => {
                let mut added = 0;
                for year in *start_year..=*end_year {
                    let query = ListQuery::years(year, year);
                    let outcome =
                        walk_pages(source, &query, &limits, StrategyKind::YearPartition, stop)
                            .await;
                    log::debug!(
                        "year {year}: {} targets over {} pages",
                        outcome.targets.len(),
                        outcome.pages_requested
                    );
                    added += frontier.merge(outcome.targets);
                }
                added
            }
            StrategyConfig::IdProbe { ranges } => {
                let targets =
                    probe_ids(source, ranges, config.discovery.probe_concurrency, stop).await;
                frontier.merge(targets)
            }
        };

        log::info!("strategy added {added} new targets ({} pending)", frontier.pending_len());
        total_added += added;
    }

    Ok(total_added)
}

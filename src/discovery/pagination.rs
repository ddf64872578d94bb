// src/discovery/pagination.rs

//! Pagination walker.
//!
//! Advances through search result pages until a run of consecutive pages
//! yields zero new detail links, tolerating occasional transient empty
//! responses. A hard page cap guarantees termination even if the
//! empty-page signal never fires.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::{StrategyKind, TargetUrl};

use super::{CatalogSource, ListQuery};

/// Termination bounds for one pagination walk.
#[derive(Debug, Clone, Copy)]
pub struct WalkLimits {
    /// Consecutive pages with zero new links before the walk stops
    pub empty_threshold: u32,

    /// Safety upper bound on pages requested
    pub max_pages: u32,
}

/// Result of one pagination walk.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Unique targets discovered, in first-seen order
    pub targets: Vec<TargetUrl>,

    /// Pages actually requested
    pub pages_requested: u32,
}

/// Walk a query's result pages from page 1 until termination.
///
/// A failed page request counts as an empty page, so a dead partition
/// still terminates after `empty_threshold` attempts.
pub async fn walk_pages(
    source: &dyn CatalogSource,
    query: &ListQuery,
    limits: &WalkLimits,
    strategy: StrategyKind,
    stop: &AtomicBool,
) -> WalkOutcome {
    let mut seen = HashSet::new();
    let mut outcome = WalkOutcome::default();
    let mut consecutive_empty = 0u32;
    let mut page = 1u32;

    while consecutive_empty < limits.empty_threshold && page <= limits.max_pages {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        outcome.pages_requested += 1;
        let links = match source.list_page(query, page).await {
            Ok(links) => links,
            Err(failure) => {
                log::warn!(
                    "list page {page} for {query} failed: {} (attempts {})",
                    failure.kind,
                    failure.attempts
                );
                Vec::new()
            }
        };

        let mut new_found = 0;
        for link in links {
            let Some(target) = TargetUrl::new(&link, strategy) else {
                continue;
            };
            if seen.insert(target.url.clone()) {
                outcome.targets.push(target);
                new_found += 1;
            }
        }

        if new_found > 0 {
            consecutive_empty = 0;
        } else {
            consecutive_empty += 1;
        }
        page += 1;
    }

    outcome
}

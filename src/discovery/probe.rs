// src/discovery/probe.rs

//! Id-probe discovery.
//!
//! Probes candidate numeric id ranges with HEAD requests and keeps the
//! ids that exist. Ranges come from configuration; the strategy finds
//! items the search facets never surface.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::{StreamExt, stream};

use crate::models::{StrategyKind, TargetUrl};

use super::CatalogSource;

/// Probe the given inclusive id ranges and return targets for ids that
/// exist. Probe errors skip the id rather than aborting the range.
pub async fn probe_ids(
    source: &dyn CatalogSource,
    ranges: &[(u64, u64)],
    concurrency: usize,
    stop: &AtomicBool,
) -> Vec<TargetUrl> {
    let mut targets = Vec::new();

    for &(first, last) in ranges {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let found: Vec<TargetUrl> = stream::iter(first..=last)
            .map(|id| async move {
                if stop.load(Ordering::Relaxed) {
                    return None;
                }
                match source.item_exists(id).await {
                    Ok(true) => TargetUrl::new(&source.detail_url(id), StrategyKind::IdProbe),
                    Ok(false) => None,
                    Err(failure) => {
                        log::debug!(
                            "probe for id {id} failed: {} (attempts {})",
                            failure.kind,
                            failure.attempts
                        );
                        None
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .filter_map(|target| async move { target })
            .collect()
            .await;

        log::info!("probed range {first}..={last}: {} ids exist", found.len());
        targets.extend(found);
    }

    targets
}

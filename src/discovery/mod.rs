// src/discovery/mod.rs

//! Multi-strategy URL discovery.
//!
//! Strategies are independent generators of candidate detail-page URLs.
//! Each runs to a termination condition and yields a set of targets which
//! the pipeline unions into the frontier, so re-running any subset of
//! strategies is idempotent.

pub mod pagination;
pub mod probe;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::fetch::{FetchClient, FetchFailure};
use crate::models::Config;

pub use pagination::{WalkLimits, WalkOutcome, walk_pages};
pub use probe::probe_ids;

/// Facet parameters for one catalog search.
///
/// The catalog's other facets (copy text, copywriter, business, media,
/// prize) are left open so a query matches everything in the year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub start_year: i32,
    pub end_year: i32,
}

impl ListQuery {
    pub fn years(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
        }
    }

    /// Search results URL for one page of this query.
    pub fn page_url(&self, base: &str, page: u32) -> String {
        format!(
            "{base}?copy=&copywriter=&ad=&biz=&media=&start={}&end={}&target_prize=all&page={page}",
            self.start_year, self.end_year
        )
    }
}

impl fmt::Display for ListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year)
    }
}

/// Read access to the catalog, as the walkers need it.
///
/// Production uses [`HttpCatalogSource`]; tests substitute synthetic
/// sources.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch one search results page and return the detail links on it.
    async fn list_page(
        &self,
        query: &ListQuery,
        page: u32,
    ) -> std::result::Result<Vec<String>, FetchFailure>;

    /// Existence check for a numeric item id.
    async fn item_exists(&self, id: u64) -> std::result::Result<bool, FetchFailure>;

    /// Detail page URL for a numeric item id.
    fn detail_url(&self, id: u64) -> String;
}

/// Catalog access over HTTP: fetches list pages and extracts the anchors
/// whose href contains the detail path marker.
pub struct HttpCatalogSource {
    fetcher: Arc<FetchClient>,
    base: Url,
    marker: String,
    link_sel: Selector,
}

impl HttpCatalogSource {
    pub fn new(fetcher: Arc<FetchClient>, config: &Config) -> Result<Self> {
        let base = Url::parse(&config.http.base_url)?;
        let link_sel = Selector::parse("a[href]")
            .map_err(|e| AppError::selector("a[href]", format!("{e:?}")))?;

        Ok(Self {
            fetcher,
            base,
            marker: config.discovery.detail_path_marker.clone(),
            link_sel,
        })
    }

    /// Extract detail links from a results page, resolved against the
    /// base URL and deduplicated in document order.
    fn extract_detail_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in document.select(&self.link_sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.contains(&self.marker) {
                continue;
            }
            let resolved = crate::utils::resolve(&self.base, href);
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
        links
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn list_page(
        &self,
        query: &ListQuery,
        page: u32,
    ) -> std::result::Result<Vec<String>, FetchFailure> {
        let url = query.page_url(self.base.as_str(), page);
        let body = self.fetcher.fetch_page(&url).await?;
        Ok(self.extract_detail_links(&body))
    }

    async fn item_exists(&self, id: u64) -> std::result::Result<bool, FetchFailure> {
        self.fetcher.head_exists(&self.detail_url(id)).await
    }

    fn detail_url(&self, id: u64) -> String {
        format!(
            "{}{}{id}/",
            self.base.origin().ascii_serialization(),
            self.marker
        )
    }
}

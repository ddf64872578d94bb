// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client and pacing settings
    #[serde(default)]
    pub http: HttpConfig,

    /// URL discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Batch and checkpoint settings
    #[serde(default)]
    pub harvest: HarvestConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if url::Url::parse(&self.http.base_url).is_err() {
            return Err(AppError::validation("http.base_url is not a valid URL"));
        }
        if self.discovery.empty_page_threshold == 0 {
            return Err(AppError::validation(
                "discovery.empty_page_threshold must be > 0",
            ));
        }
        if self.discovery.max_pages_per_walk == 0 {
            return Err(AppError::validation(
                "discovery.max_pages_per_walk must be > 0",
            ));
        }
        if self.discovery.strategies.is_empty() {
            return Err(AppError::validation("No discovery strategies configured"));
        }
        for strategy in &self.discovery.strategies {
            strategy.validate()?;
        }
        if self.harvest.batch_size == 0 {
            return Err(AppError::validation("harvest.batch_size must be > 0"));
        }
        if self.harvest.checkpoint_interval == 0 {
            return Err(AppError::validation(
                "harvest.checkpoint_interval must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP client and request pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL of the catalog search endpoint
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds (connect + read)
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum delay between consecutive requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Retries allowed per URL after the first attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base backoff in milliseconds; doubles on each retry
    #[serde(default = "defaults::retry_base")]
    pub retry_base_ms: u64,

    /// Worker pool size for detail page fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_retries: defaults::max_retries(),
            retry_base_ms: defaults::retry_base(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// URL discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Consecutive pages with zero new detail links before a walk stops
    #[serde(default = "defaults::empty_page_threshold")]
    pub empty_page_threshold: u32,

    /// Hard page cap per walk, guaranteeing termination
    #[serde(default = "defaults::max_pages_per_walk")]
    pub max_pages_per_walk: u32,

    /// Path substring identifying detail page links
    #[serde(default = "defaults::detail_path_marker")]
    pub detail_path_marker: String,

    /// Concurrent HEAD probes for the id-probe strategy
    #[serde(default = "defaults::probe_concurrency")]
    pub probe_concurrency: usize,

    /// Discovery strategies to run, in order
    #[serde(default = "defaults::strategies")]
    pub strategies: Vec<StrategyConfig>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            empty_page_threshold: defaults::empty_page_threshold(),
            max_pages_per_walk: defaults::max_pages_per_walk(),
            detail_path_marker: defaults::detail_path_marker(),
            probe_concurrency: defaults::probe_concurrency(),
            strategies: defaults::strategies(),
        }
    }
}

/// A configured discovery strategy.
///
/// The year bounds and id ranges are deliberately configuration rather
/// than constants: the catalog's true extent is unverified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Single sweep across the full year range
    Pagination { start_year: i32, end_year: i32 },

    /// Independent pagination walk per year
    YearPartition { start_year: i32, end_year: i32 },

    /// HEAD existence checks over inclusive numeric id ranges
    IdProbe { ranges: Vec<(u64, u64)> },
}

impl StrategyConfig {
    fn validate(&self) -> Result<()> {
        match self {
            StrategyConfig::Pagination {
                start_year,
                end_year,
            }
            | StrategyConfig::YearPartition {
                start_year,
                end_year,
            } => {
                if start_year > end_year {
                    return Err(AppError::validation(format!(
                        "strategy year range {start_year}..{end_year} is inverted"
                    )));
                }
            }
            StrategyConfig::IdProbe { ranges } => {
                if ranges.is_empty() {
                    return Err(AppError::validation("id_probe strategy has no ranges"));
                }
                for (start, end) in ranges {
                    if start > end {
                        return Err(AppError::validation(format!(
                            "id_probe range {start}..{end} is inverted"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Batch and checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Maximum records/failures per batch file
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Completed items between checkpoint rewrites
    #[serde(default = "defaults::checkpoint_interval")]
    pub checkpoint_interval: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            checkpoint_interval: defaults::checkpoint_interval(),
        }
    }
}

mod defaults {
    use super::StrategyConfig;

    // HTTP defaults
    pub fn base_url() -> String {
        "https://www.tcc.gr.jp/copira/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; copira-harvest/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        200
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_base() -> u64 {
        1000
    }
    pub fn max_concurrent() -> usize {
        3
    }

    // Discovery defaults
    pub fn empty_page_threshold() -> u32 {
        3
    }
    pub fn max_pages_per_walk() -> u32 {
        500
    }
    pub fn detail_path_marker() -> String {
        "/copira/id/".into()
    }
    pub fn probe_concurrency() -> usize {
        5
    }
    pub fn strategies() -> Vec<StrategyConfig> {
        vec![
            StrategyConfig::Pagination {
                start_year: 1960,
                end_year: 2025,
            },
            StrategyConfig::YearPartition {
                start_year: 1960,
                end_year: 2025,
            },
        ]
    }

    // Harvest defaults
    pub fn batch_size() -> usize {
        100
    }
    pub fn checkpoint_interval() -> usize {
        50
    }
}

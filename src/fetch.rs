// src/fetch.rs

//! Rate-limited HTTP client with bounded retry.
//!
//! Transient failures (timeout, connection errors, 5xx, 429) are retried
//! with exponential backoff; other 4xx statuses fail immediately. A fixed
//! minimum delay between consecutive requests enforces a courteous request
//! rate. This is deliberately a static inter-request delay rather than a
//! token bucket: the target rate is small and constant.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::models::{FailureKind, HttpConfig};

/// A terminal fetch failure with the total attempts made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub attempts: u32,
}

/// HTTP client wrapper enforcing pacing, retry and error classification.
pub struct FetchClient {
    client: reqwest::Client,
    max_retries: u32,
    retry_base: Duration,
    request_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl FetchClient {
    /// Build a client from HTTP configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base: Duration::from_millis(config.retry_base_ms),
            request_delay: Duration::from_millis(config.request_delay_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Fetch a page body, retrying transient failures.
    ///
    /// A URL is requested at most `max_retries + 1` times.
    pub async fn fetch_page(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let mut attempts = 0u32;

        loop {
            self.pace().await;
            attempts += 1;

            let kind = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => classify_transport(&e),
                        }
                    } else {
                        let kind = FailureKind::Http(status.as_u16());
                        if !kind.is_transient() {
                            return Err(FetchFailure { kind, attempts });
                        }
                        kind
                    }
                }
                Err(e) => classify_transport(&e),
            };

            if attempts > self.max_retries {
                return Err(FetchFailure { kind, attempts });
            }

            let delay = self.backoff_delay(attempts - 1);
            log::debug!("retrying {url} after {kind} (attempt {attempts}, backoff {delay:?})");
            tokio::time::sleep(delay).await;
        }
    }

    /// Lightweight existence check via HEAD.
    ///
    /// 404 maps to `Ok(false)` rather than an error: absence is a normal
    /// answer for the id-probe strategy.
    pub async fn head_exists(&self, url: &str) -> std::result::Result<bool, FetchFailure> {
        let mut attempts = 0u32;

        loop {
            self.pace().await;
            attempts += 1;

            let kind = match self.client.head(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(true);
                    }
                    if status.as_u16() == 404 {
                        return Ok(false);
                    }
                    let kind = FailureKind::Http(status.as_u16());
                    if !kind.is_transient() {
                        return Err(FetchFailure { kind, attempts });
                    }
                    kind
                }
                Err(e) => classify_transport(&e),
            };

            if attempts > self.max_retries {
                return Err(FetchFailure { kind, attempts });
            }

            tokio::time::sleep(self.backoff_delay(attempts - 1)).await;
        }
    }

    /// Sleep until at least `request_delay` has passed since the previous
    /// request from this client.
    async fn pace(&self) {
        if self.request_delay.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Backoff for a given retry index: `base * 2^attempt`, capped to
    /// avoid shift overflow on absurd retry counts.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

fn classify_transport(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Connection
    }
}

// src/models/record.rs

//! Harvested records and retained failure records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successfully extracted catalog item.
///
/// Records are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Catalog item identifier (from the detail URL path)
    pub id: String,

    /// Extracted label/value fields
    pub fields: BTreeMap<String, String>,

    /// Detail page the record was extracted from
    pub source_url: String,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Classification of a terminal per-URL failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connect or read timeout
    Timeout,
    /// Non-success HTTP status
    Http(u16),
    /// Connection-level failure (refused, reset, TLS)
    Connection,
    /// Page fetched but the extractor rejected it
    Parse,
}

impl FailureKind {
    /// Whether a fetch failure of this kind is worth retrying.
    ///
    /// 429 and 5xx are transient; other HTTP errors are not. Parse
    /// failures are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Connection => true,
            FailureKind::Http(status) => *status == 429 || (500..600).contains(status),
            FailureKind::Parse => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Http(status) => write!(f, "http {status}"),
            FailureKind::Connection => write!(f, "connection error"),
            FailureKind::Parse => write!(f, "parse error"),
        }
    }
}

/// A URL that terminally failed, retained for auditability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureRecord {
    /// The URL that failed
    pub url: String,

    /// What went wrong
    pub kind: FailureKind,

    /// Total request attempts made (1 for non-retriable failures)
    pub attempts: u32,
}

/// One entry in a persisted batch file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum BatchEntry {
    Record(Record),
    Failure(FailureRecord),
}

impl BatchEntry {
    /// The URL this entry is about.
    pub fn url(&self) -> &str {
        match self {
            BatchEntry::Record(record) => &record.source_url,
            BatchEntry::Failure(failure) => &failure.url,
        }
    }
}

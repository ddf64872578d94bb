// src/models/target.rs

//! Discovered target URLs and their provenance.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::utils;

/// Which discovery strategy proposed a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Single global sweep over the paginated search results
    Pagination,
    /// Per-year pagination walks over a bounded year range
    YearPartition,
    /// HEAD existence checks over numeric id ranges
    IdProbe,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Pagination => "pagination",
            StrategyKind::YearPartition => "year_partition",
            StrategyKind::IdProbe => "id_probe",
        };
        f.write_str(name)
    }
}

/// A normalized target URL plus the strategy that discovered it.
///
/// Identity is the normalized URL alone: the strategy tag is provenance
/// metadata and does not participate in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetUrl {
    /// Normalized absolute URL
    pub url: String,

    /// Strategy that proposed this URL
    pub strategy: StrategyKind,
}

impl TargetUrl {
    /// Build a target from a raw URL, normalizing it first.
    ///
    /// Returns `None` if the URL is relative or unparseable.
    pub fn new(raw: &str, strategy: StrategyKind) -> Option<Self> {
        utils::normalize(raw).map(|url| Self { url, strategy })
    }
}

impl PartialEq for TargetUrl {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for TargetUrl {}

impl Hash for TargetUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_normalizes() {
        let target = TargetUrl::new(
            "https://WWW.tcc.gr.jp/copira/id/99/#body",
            StrategyKind::Pagination,
        )
        .unwrap();
        assert_eq!(target.url, "https://www.tcc.gr.jp/copira/id/99/");
    }

    #[test]
    fn test_new_rejects_relative() {
        assert!(TargetUrl::new("/copira/id/99/", StrategyKind::Pagination).is_none());
    }

    #[test]
    fn test_identity_ignores_strategy() {
        let a = TargetUrl::new("https://example.com/id/1/", StrategyKind::Pagination).unwrap();
        let b = TargetUrl::new("https://example.com/id/1/", StrategyKind::IdProbe).unwrap();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }
}

// src/utils/url.rs

//! URL normalization and manipulation.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Matches the numeric item id in a detail URL path (`/id/12345/`).
static ITEM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/id/(\d+)").expect("item id pattern is valid"));

/// Normalize a URL for identity comparison.
///
/// Parses the URL (which lowercases the host), drops any fragment, and
/// returns the canonical string form. Returns `None` for relative or
/// unparseable input.
pub fn normalize(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw).ok()?;
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// Resolve a potentially relative URL against a base URL.
pub fn resolve(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the numeric item identifier from a detail page URL.
pub fn extract_item_id(url: &str) -> Option<u64> {
    ITEM_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

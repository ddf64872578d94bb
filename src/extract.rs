// src/extract.rs

//! Detail page extraction.
//!
//! Maps the catalog's labeled table cells to named record fields through a
//! static label lookup table. The rest of the engine only depends on the
//! Result-shaped contract of [`Extractor::extract`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::utils;

/// Japanese table labels mapped to stable field names.
const LABEL_FIELDS: &[(&str, &str)] = &[
    ("広告主", "advertiser"),
    ("受賞", "award"),
    ("業種", "industry"),
    ("媒体", "media_type"),
    ("掲載年度", "publication_year"),
    ("掲載ページ", "page_number"),
    ("コピーライター", "copywriter"),
    ("広告会社", "agency"),
    ("制作会社", "production_company"),
];

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})").expect("year pattern is valid"));

/// Why a fetched page could not be turned into a record.
///
/// Parse failures are terminal: the page was fetched successfully, so a
/// retry would see the same layout. They are recorded for offline review.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no item id in url {0}")]
    MissingId(String),

    #[error("no labeled fields found")]
    EmptyFields,
}

/// Extracts records from catalog detail pages.
pub struct Extractor {
    title_sel: Selector,
    row_sel: Selector,
    label_sel: Selector,
    value_sel: Selector,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title_sel: parse_selector("h1")?,
            row_sel: parse_selector("table tr")?,
            label_sel: parse_selector("th")?,
            value_sel: parse_selector("td")?,
        })
    }

    /// Turn one fetched detail page into a record.
    pub fn extract(&self, url: &str, html: &str) -> std::result::Result<Record, ExtractError> {
        let id = utils::extract_item_id(url)
            .map(|id| id.to_string())
            .ok_or_else(|| ExtractError::MissingId(url.to_string()))?;

        let document = Html::parse_document(html);
        let mut fields = BTreeMap::new();

        if let Some(title) = document.select(&self.title_sel).next() {
            let text = collect_text(&title);
            if !text.is_empty() {
                fields.insert("title".to_string(), text);
            }
        }

        for row in document.select(&self.row_sel) {
            let Some(label_elem) = row.select(&self.label_sel).next() else {
                continue;
            };
            let Some(value_elem) = row.select(&self.value_sel).next() else {
                continue;
            };

            let label = collect_text(&label_elem);
            let label = label.trim_end_matches([':', '：']).trim();
            let value = collect_text(&value_elem);
            if label.is_empty() || value.is_empty() {
                continue;
            }

            fields.insert(field_name(label), value);
        }

        if fields.is_empty() {
            return Err(ExtractError::EmptyFields);
        }

        // Derive a numeric year from the publication year text
        if let Some(year) = fields
            .get("publication_year")
            .and_then(|text| YEAR.captures(text))
            .and_then(|caps| caps.get(1))
        {
            fields.insert("year".to_string(), year.as_str().to_string());
        }

        Ok(Record {
            id,
            fields,
            source_url: url.to_string(),
            fetched_at: Utc::now(),
        })
    }
}

/// Look up a table label, falling back to a normalized form of the label
/// itself for headers the table does not know.
fn field_name(label: &str) -> String {
    LABEL_FIELDS
        .iter()
        .find(|(japanese, _)| *japanese == label)
        .map(|(_, field)| (*field).to_string())
        .unwrap_or_else(|| label.to_lowercase().replace(' ', "_"))
}

fn collect_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body>
        <h1>  水と生きる  </h1>
        <table>
            <tr><th>広告主：</th><td>サントリー</td></tr>
            <tr><th>コピーライター</th><td>山田 太郎</td></tr>
            <tr><th>掲載年度</th><td>2005年度</td></tr>
            <tr><th>Grade</th><td>A</td></tr>
            <tr><th>空欄</th><td></td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_extract_maps_labels() {
        let extractor = Extractor::new().unwrap();
        let record = extractor
            .extract("https://www.tcc.gr.jp/copira/id/12345/", SAMPLE)
            .unwrap();

        assert_eq!(record.id, "12345");
        assert_eq!(record.fields["title"], "水と生きる");
        assert_eq!(record.fields["advertiser"], "サントリー");
        assert_eq!(record.fields["copywriter"], "山田 太郎");
        assert_eq!(record.fields["publication_year"], "2005年度");
        assert_eq!(record.fields["year"], "2005");
        // Unknown labels fall back to a normalized form
        assert_eq!(record.fields["grade"], "A");
        // Empty values are skipped
        assert!(!record.fields.contains_key("空欄"));
    }

    #[test]
    fn test_extract_requires_item_id() {
        let extractor = Extractor::new().unwrap();
        let err = extractor
            .extract("https://www.tcc.gr.jp/copira/", SAMPLE)
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingId(_)));
    }

    #[test]
    fn test_extract_rejects_empty_page() {
        let extractor = Extractor::new().unwrap();
        let err = extractor
            .extract(
                "https://www.tcc.gr.jp/copira/id/1/",
                "<html><body><p>404</p></body></html>",
            )
            .unwrap_err();
        assert_eq!(err, ExtractError::EmptyFields);
    }
}

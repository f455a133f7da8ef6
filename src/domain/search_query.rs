//! Search query entity and the watermark arithmetic around it
//!
//! A `SearchQuery` is identified by its normalised term. Its `watermark` is the
//! highest page known to be fully scraped and committed at least once.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::HarvestError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: i64,
    #[serde(rename = "searchTerm")]
    pub search_term: String,
    pub watermark: u32,
    /// Stamped on every scrape attempt, successful or not
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl SearchQuery {
    /// Pages that still have to be fetched to satisfy `pages_required`.
    ///
    /// `None` when the cache already covers the request.
    pub fn gap_range(&self, pages_required: u32) -> Option<RangeInclusive<u32>> {
        if self.watermark >= pages_required {
            None
        } else {
            Some(self.watermark + 1..=pages_required)
        }
    }

    /// Full refresh range `[1, watermark]`; `None` for never-scraped queries.
    pub fn refresh_range(&self) -> Option<RangeInclusive<u32>> {
        (self.watermark > 0).then_some(1..=self.watermark)
    }

    /// Highest page that may be served for a request of `pages_required` pages.
    pub fn servable_through(&self, pages_required: u32) -> u32 {
        pages_required.min(self.watermark)
    }
}

/// Lower-cases and trims a search term. Blank terms yield `None`.
pub fn normalize_term(raw: &str) -> Option<String> {
    let term = raw.trim().to_lowercase();
    (!term.is_empty()).then_some(term)
}

/// Validates the raw `pages_required` parameter the way the HTTP layer used to:
/// it must be present and parse to a positive integer.
pub fn parse_pages_required(raw: Option<&str>) -> Result<u32, HarvestError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| HarvestError::invalid_input("'pages_required' query parameter is required."))?;

    match raw.parse::<i64>() {
        Ok(pages) if pages > 0 => u32::try_from(pages)
            .map_err(|_| HarvestError::invalid_input("'pages_required' is too large.")),
        _ => Err(HarvestError::invalid_input(
            "'pages_required' must be a positive integer.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn query_with_watermark(watermark: u32) -> SearchQuery {
        SearchQuery {
            id: 1,
            search_term: "taladro".to_string(),
            watermark,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn gap_range_only_covers_missing_pages() {
        let query = query_with_watermark(3);
        assert_eq!(query.gap_range(5), Some(4..=5));
        assert_eq!(query.gap_range(3), None);
        assert_eq!(query.gap_range(1), None);
    }

    #[test]
    fn fresh_query_gap_starts_at_first_page() {
        assert_eq!(query_with_watermark(0).gap_range(2), Some(1..=2));
    }

    #[test]
    fn refresh_range_skips_unscraped_queries() {
        assert_eq!(query_with_watermark(0).refresh_range(), None);
        assert_eq!(query_with_watermark(4).refresh_range(), Some(1..=4));
    }

    #[test]
    fn servable_is_bounded_by_watermark() {
        assert_eq!(query_with_watermark(1).servable_through(2), 1);
        assert_eq!(query_with_watermark(7).servable_through(2), 2);
    }

    #[rstest]
    #[case("  Taladro ", Some("taladro"))]
    #[case("AIRPODS PRO", Some("airpods pro"))]
    #[case("   ", None)]
    #[case("", None)]
    fn term_normalisation(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_term(raw).as_deref(), expected);
    }

    #[rstest]
    #[case(Some("3"), Ok(3))]
    #[case(Some(" 12 "), Ok(12))]
    #[case(Some("0"), Err(()))]
    #[case(Some("-4"), Err(()))]
    #[case(Some("two"), Err(()))]
    #[case(Some(""), Err(()))]
    #[case(None, Err(()))]
    fn pages_required_validation(#[case] raw: Option<&str>, #[case] expected: Result<u32, ()>) {
        let parsed = parse_pages_required(raw);
        match expected {
            Ok(pages) => assert_eq!(parsed, Ok(pages)),
            Err(()) => assert!(matches!(parsed, Err(HarvestError::InvalidInput(_)))),
        }
    }
}

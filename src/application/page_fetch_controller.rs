//! Sequential page fetching for one query
//!
//! Pages are fetched strictly in ascending order with a pause before each
//! request. The first error, empty page or budget overrun halts the range, so
//! the fetched pages always form a prefix of the requested range.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use crate::domain::extractor::ListingExtractor;
use crate::domain::halt_reason::HaltReason;
use crate::domain::product::{Listing, normalize};

/// Result of fetching one page range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Pages that produced listings, ascending and contiguous from the range start
    pub committed_pages: Vec<u32>,
    pub products_by_page: BTreeMap<u32, Vec<Listing>>,
    pub halt: HaltReason,
    pub last_error: Option<String>,
}

impl FetchOutcome {
    fn new() -> Self {
        Self {
            committed_pages: Vec::new(),
            products_by_page: BTreeMap::new(),
            halt: HaltReason::Completed,
            last_error: None,
        }
    }

    pub fn highest_committed(&self) -> Option<u32> {
        self.committed_pages.last().copied()
    }

    pub fn product_count(&self) -> usize {
        self.products_by_page.values().map(Vec::len).sum()
    }
}

pub struct PageFetchController {
    extractor: Arc<dyn ListingExtractor>,
    request_delay: Duration,
}

impl PageFetchController {
    pub fn new(extractor: Arc<dyn ListingExtractor>, request_delay: Duration) -> Self {
        Self {
            extractor,
            request_delay,
        }
    }

    /// Fetches `pages` for `term` until a terminal condition or `deadline`.
    ///
    /// Never fails: extractor errors become `HaltReason::Error`.
    pub async fn fetch_range(
        &self,
        term: &str,
        pages: RangeInclusive<u32>,
        deadline: Instant,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::new();

        for page in pages {
            let attempt = timeout_at(deadline, async {
                sleep(self.request_delay).await;
                self.extractor.fetch(term, page).await
            })
            .await;

            match attempt {
                Err(_) => {
                    warn!(term, page, "⏱️ Request budget exhausted, stopping page range");
                    outcome.halt = HaltReason::Timeout;
                    outcome.last_error = Some(format!("Request budget exhausted before page {page} completed"));
                    break;
                }
                Ok(Err(err)) => {
                    warn!(term, page, error = %err, "❌ Page fetch failed, stopping page range");
                    outcome.halt = HaltReason::Error;
                    outcome.last_error = Some(err.to_string());
                    break;
                }
                Ok(Ok(raw)) if raw.is_empty() => {
                    info!(term, page, "📭 Empty page, no more results");
                    outcome.halt = HaltReason::Exhausted;
                    break;
                }
                Ok(Ok(raw)) => {
                    let listings: Vec<Listing> = raw.into_iter().map(normalize).collect();
                    debug!(term, page, count = listings.len(), "Page fetched");
                    outcome.products_by_page.insert(page, listings);
                    outcome.committed_pages.push(page);
                }
            }
        }

        outcome
    }
}

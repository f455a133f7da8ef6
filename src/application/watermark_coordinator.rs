//! Persists one query's fetched pages and advances its watermark
//!
//! The commit itself is atomic in the store. This layer owns the retry policy
//! for lost compare-and-swap races.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::page_fetch_controller::FetchOutcome;
use crate::domain::errors::{HarvestError, StoreError};
use crate::domain::repositories::ListingStore;
use crate::domain::search_query::SearchQuery;

/// What one commit changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    #[serde(rename = "previousWatermark")]
    pub previous_watermark: u32,
    pub watermark: u32,
    #[serde(rename = "rowsAdded")]
    pub rows_added: u64,
    #[serde(rename = "pagesCommitted")]
    pub pages_committed: Vec<u32>,
}

pub struct WatermarkCoordinator {
    store: Arc<dyn ListingStore>,
    /// Total attempts, including the first one
    retry_limit: u32,
    backoff: Duration,
}

impl WatermarkCoordinator {
    pub fn new(store: Arc<dyn ListingStore>, retry_limit: u32, backoff: Duration) -> Self {
        Self {
            store,
            retry_limit: retry_limit.max(1),
            backoff,
        }
    }

    /// Commits every fetched page and stamps the attempt, even when nothing was fetched.
    pub async fn commit_query(
        &self,
        query: &SearchQuery,
        outcome: &FetchOutcome,
    ) -> Result<CommitReport, HarvestError> {
        let attempted_at = Utc::now();
        let highest_page = outcome.highest_committed().unwrap_or(0);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self
                .store
                .commit_pages(query.id, &outcome.products_by_page, highest_page, attempted_at)
                .await
            {
                Ok(commit) => {
                    if commit.watermark > commit.previous_watermark {
                        info!(
                            term = %query.search_term,
                            from = commit.previous_watermark,
                            to = commit.watermark,
                            rows_added = commit.rows_added,
                            "📈 Watermark advanced"
                        );
                    } else {
                        debug!(
                            term = %query.search_term,
                            watermark = commit.watermark,
                            rows_added = commit.rows_added,
                            "Commit left watermark unchanged"
                        );
                    }
                    return Ok(CommitReport {
                        previous_watermark: commit.previous_watermark,
                        watermark: commit.watermark,
                        rows_added: commit.rows_added,
                        pages_committed: outcome.committed_pages.clone(),
                    });
                }
                Err(StoreError::Conflict) if attempt < self.retry_limit => {
                    warn!(
                        term = %query.search_term,
                        attempt,
                        "🔁 Watermark conflict, retrying commit"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(StoreError::Conflict) => {
                    warn!(term = %query.search_term, attempts = attempt, "Watermark conflict persisted");
                    return Err(HarvestError::StorageConflict { attempts: attempt });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

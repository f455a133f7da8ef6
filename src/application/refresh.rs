//! Scheduled refresh: re-scrape every known query over `[1, watermark]`
//!
//! Refreshing merges into the stored rows (insert-if-absent), so a sweep
//! never deletes or rewrites listings. Queries are independent: one failing
//! query never stops the sweep.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::scrape_pipeline::ScrapePipeline;
use crate::domain::errors::HarvestError;
use crate::domain::halt_reason::HaltReason;
use crate::domain::repositories::ListingStore;
use crate::domain::search_query::SearchQuery;

/// Outcome of refreshing one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRefreshOutcome {
    pub term: String,
    #[serde(rename = "previousWatermark")]
    pub previous_watermark: u32,
    pub watermark: u32,
    /// `None` when the commit itself failed
    pub halt: Option<HaltReason>,
    #[serde(rename = "rowsAdded")]
    pub rows_added: u64,
    pub error: Option<String>,
}

impl QueryRefreshOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some() || self.halt.is_some_and(HaltReason::is_failure)
    }
}

/// Summary of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    #[serde(rename = "queriesProcessed")]
    pub queries_processed: usize,
    #[serde(rename = "queriesFailed")]
    pub queries_failed: usize,
    /// Never-scraped queries left alone
    #[serde(rename = "queriesSkipped")]
    pub queries_skipped: usize,
    pub outcomes: Vec<QueryRefreshOutcome>,
}

pub struct RefreshOrchestrator {
    store: Arc<dyn ListingStore>,
    pipeline: Arc<ScrapePipeline>,
    max_concurrent_queries: usize,
}

impl RefreshOrchestrator {
    pub fn new(
        store: Arc<dyn ListingStore>,
        pipeline: Arc<ScrapePipeline>,
        max_concurrent_queries: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            max_concurrent_queries: max_concurrent_queries.max(1),
        }
    }

    /// Runs one sweep over every stored query.
    ///
    /// Only listing the queries can fail; per-query failures are recorded in
    /// the report.
    pub async fn refresh_all(&self) -> Result<RefreshReport, HarvestError> {
        let queries = self.store.list_queries().await.map_err(|err| {
            error!(error = %err, "💥 Could not list queries for refresh");
            HarvestError::from(err).into_boundary()
        })?;

        let mut report = RefreshReport::default();
        let mut to_refresh = Vec::new();
        for query in queries {
            if query.refresh_range().is_some() {
                to_refresh.push(query);
            } else {
                info!(term = %query.search_term, "⏭️ Skipping query that was never scraped");
                report.queries_skipped += 1;
            }
        }

        info!(
            queries = to_refresh.len(),
            skipped = report.queries_skipped,
            workers = self.max_concurrent_queries,
            "🔄 Starting refresh sweep"
        );

        let mut outcomes: Vec<QueryRefreshOutcome> = stream::iter(to_refresh)
            .map(|query| async move { self.refresh_query(query).await })
            .buffer_unordered(self.max_concurrent_queries)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.term.cmp(&b.term));

        report.queries_processed = outcomes.len();
        report.queries_failed = outcomes.iter().filter(|o| o.failed()).count();
        report.outcomes = outcomes;

        info!(
            processed = report.queries_processed,
            failed = report.queries_failed,
            skipped = report.queries_skipped,
            "🏁 Refresh sweep finished"
        );
        Ok(report)
    }

    async fn refresh_query(&self, query: SearchQuery) -> QueryRefreshOutcome {
        let previous_watermark = query.watermark;
        let Some(range) = query.refresh_range() else {
            return QueryRefreshOutcome {
                term: query.search_term,
                previous_watermark,
                watermark: previous_watermark,
                halt: None,
                rows_added: 0,
                error: None,
            };
        };

        match self.pipeline.run(&query, range).await {
            Ok(run) => {
                if run.fetch.halt.is_failure() {
                    warn!(
                        term = %query.search_term,
                        halt = %run.fetch.halt,
                        error = run.fetch.last_error.as_deref().unwrap_or(""),
                        "⚠️ Refresh stopped early"
                    );
                }
                QueryRefreshOutcome {
                    term: query.search_term,
                    previous_watermark,
                    watermark: run.commit.watermark,
                    halt: Some(run.fetch.halt),
                    rows_added: run.commit.rows_added,
                    error: run.fetch.last_error,
                }
            }
            Err(err) => {
                error!(term = %query.search_term, error = %err, "❌ Refresh commit failed");
                QueryRefreshOutcome {
                    term: query.search_term,
                    previous_watermark,
                    watermark: previous_watermark,
                    halt: None,
                    rows_added: 0,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

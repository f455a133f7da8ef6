//! Shared fetch-then-commit pipeline with a bounded worker pool
//!
//! On-demand requests and refresh sweeps both go through `ScrapePipeline::run`,
//! so the pool bounds the number of queries scraping upstream at any moment.
//! Within one query pages are never fetched in parallel.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::info;

use crate::application::page_fetch_controller::{FetchOutcome, PageFetchController};
use crate::application::watermark_coordinator::{CommitReport, WatermarkCoordinator};
use crate::domain::errors::HarvestError;
use crate::domain::extractor::ListingExtractor;
use crate::domain::repositories::ListingStore;
use crate::domain::search_query::SearchQuery;
use crate::infrastructure::config::ScrapingConfig;

/// Pipeline tuning, usually taken from `ScrapingConfig`
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub request_delay: Duration,
    pub request_budget: Duration,
    pub max_concurrent_queries: usize,
    pub commit_retry_limit: u32,
    pub commit_retry_backoff: Duration,
}

impl From<&ScrapingConfig> for PipelineSettings {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            request_delay: config.request_delay(),
            request_budget: config.request_budget(),
            max_concurrent_queries: config.max_concurrent_queries,
            commit_retry_limit: config.commit_retry_limit,
            commit_retry_backoff: config.commit_retry_backoff(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&ScrapingConfig::default())
    }
}

/// One fetch + commit for one query
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub fetch: FetchOutcome,
    pub commit: CommitReport,
}

pub struct ScrapePipeline {
    controller: PageFetchController,
    coordinator: WatermarkCoordinator,
    permits: Arc<Semaphore>,
    request_budget: Duration,
}

impl ScrapePipeline {
    pub fn new(
        extractor: Arc<dyn ListingExtractor>,
        store: Arc<dyn ListingStore>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            controller: PageFetchController::new(extractor, settings.request_delay),
            coordinator: WatermarkCoordinator::new(
                store,
                settings.commit_retry_limit,
                settings.commit_retry_backoff,
            ),
            permits: Arc::new(Semaphore::new(settings.max_concurrent_queries.max(1))),
            request_budget: settings.request_budget,
        }
    }

    /// Fetches `pages` for `query` and commits whatever was fetched.
    ///
    /// The request budget starts once a worker slot is acquired.
    pub async fn run(
        &self,
        query: &SearchQuery,
        pages: RangeInclusive<u32>,
    ) -> Result<ScrapeRun, HarvestError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| HarvestError::internal("Scrape worker pool is closed"))?;

        let deadline = Instant::now() + self.request_budget;
        info!(
            term = %query.search_term,
            from = pages.start(),
            to = pages.end(),
            "🚀 Scraping page range"
        );

        let fetch = self
            .controller
            .fetch_range(&query.search_term, pages, deadline)
            .await;
        let commit = self.coordinator.commit_query(query, &fetch).await?;

        info!(
            term = %query.search_term,
            halt = %fetch.halt,
            pages = fetch.committed_pages.len(),
            watermark = commit.watermark,
            "✅ Scrape finished"
        );

        Ok(ScrapeRun { fetch, commit })
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

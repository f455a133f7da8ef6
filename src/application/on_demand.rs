//! On-demand entry point: "give me N pages of listings for this term"
//!
//! Only the pages beyond the stored watermark are scraped; everything up to
//! `min(pages_required, watermark)` is then served from the store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::scrape_pipeline::ScrapePipeline;
use crate::domain::errors::HarvestError;
use crate::domain::halt_reason::HaltReason;
use crate::domain::product::ExportRow;
use crate::domain::repositories::ListingStore;
use crate::domain::search_query::normalize_term;

/// Rows served for one request plus what the request did upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductsResponse {
    pub term: String,
    pub rows: Vec<ExportRow>,
    #[serde(rename = "pagesRequired")]
    pub pages_required: u32,
    #[serde(rename = "servedThroughPage")]
    pub served_through_page: u32,
    pub watermark: u32,
    /// Pages scraped by this request (empty when fully cached)
    #[serde(rename = "fetchedPages")]
    pub fetched_pages: Vec<u32>,
    /// `None` when no scrape was needed
    pub halt: Option<HaltReason>,
}

impl ProductsResponse {
    /// Download name for the CSV export
    pub fn suggested_filename(&self) -> String {
        format!(
            "products_{}_pages_1_to_{}.csv",
            self.term, self.served_through_page
        )
    }

    /// True when the scrape stopped early because of an upstream failure
    pub fn is_partial(&self) -> bool {
        self.halt.is_some_and(HaltReason::is_failure)
    }

    /// True when fewer pages were served than requested, for any halt reason
    pub fn is_short(&self) -> bool {
        self.served_through_page < self.pages_required
    }
}

pub struct OnDemandOrchestrator {
    store: Arc<dyn ListingStore>,
    pipeline: Arc<ScrapePipeline>,
}

impl OnDemandOrchestrator {
    pub fn new(store: Arc<dyn ListingStore>, pipeline: Arc<ScrapePipeline>) -> Self {
        Self { store, pipeline }
    }

    /// Fills the page gap for `term` if needed and serves the cached rows.
    ///
    /// Unexpected failures are logged here and reach the caller as a generic
    /// `Internal` error.
    pub async fn get_products(
        &self,
        term: &str,
        pages_required: u32,
    ) -> Result<ProductsResponse, HarvestError> {
        self.serve(term, pages_required).await.map_err(|err| {
            if matches!(
                err,
                HarvestError::Internal(_) | HarvestError::StorageConflict { .. }
            ) {
                error!(term, pages_required, error = %err, "💥 On-demand request failed");
            }
            err.into_boundary()
        })
    }

    async fn serve(
        &self,
        raw_term: &str,
        pages_required: u32,
    ) -> Result<ProductsResponse, HarvestError> {
        let term = normalize_term(raw_term)
            .ok_or_else(|| HarvestError::invalid_input("'search_term' query parameter is required."))?;
        if pages_required == 0 {
            return Err(HarvestError::invalid_input(
                "'pages_required' must be a positive integer.",
            ));
        }

        let mut query = self.store.get_or_create_query(&term).await?;
        let mut fetched_pages = Vec::new();
        let mut halt = None;
        let mut last_error = None;
        let mut scrape_failure = None;

        match query.gap_range(pages_required) {
            None => {
                info!(term = %term, pages_required, watermark = query.watermark, "📦 Serving from cache");
            }
            Some(gap) => match self.pipeline.run(&query, gap).await {
                Ok(run) => {
                    query.watermark = run.commit.watermark;
                    fetched_pages = run.fetch.committed_pages;
                    halt = Some(run.fetch.halt);
                    last_error = run.fetch.last_error;
                }
                Err(err) => {
                    warn!(term = %term, error = %err, "⚠️ Scrape failed, falling back to cached pages");
                    if let Some(current) = self.store.find_query(&term).await? {
                        query.watermark = current.watermark;
                    }
                    scrape_failure = Some(err);
                }
            },
        }

        let served_through_page = query.servable_through(pages_required);
        let rows: Vec<ExportRow> = if served_through_page == 0 {
            Vec::new()
        } else {
            self.store
                .products_through_page(query.id, served_through_page)
                .await?
                .into_iter()
                .map(ExportRow::from)
                .collect()
        };

        if rows.is_empty() {
            if let Some(err) = scrape_failure {
                return Err(err);
            }
            if halt.is_some_and(HaltReason::is_failure) {
                return Err(HarvestError::UpstreamUnavailable(
                    last_error.unwrap_or_else(|| "upstream did not answer".to_string()),
                ));
            }
            return Err(HarvestError::NotFound {
                term,
                max_page: pages_required,
            });
        }

        Ok(ProductsResponse {
            term,
            rows,
            pages_required,
            served_through_page,
            watermark: query.watermark,
            fetched_pages,
            halt,
        })
    }
}

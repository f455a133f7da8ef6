//! Application layer module
//!
//! This module contains the scrape-cache-serve pipeline and the two entry
//! points (on-demand and scheduled refresh) that orchestrate it.

pub mod on_demand;
pub mod page_fetch_controller;
pub mod refresh;
pub mod scrape_pipeline;
pub mod state;
pub mod watermark_coordinator;

pub use on_demand::{OnDemandOrchestrator, ProductsResponse};
pub use page_fetch_controller::{FetchOutcome, PageFetchController};
pub use refresh::{QueryRefreshOutcome, RefreshOrchestrator, RefreshReport};
pub use scrape_pipeline::{PipelineSettings, ScrapePipeline, ScrapeRun};
pub use state::AppState;
pub use watermark_coordinator::{CommitReport, WatermarkCoordinator};

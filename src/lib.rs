//! Listing Harvester - incremental scrape-cache-serve pipeline
//!
//! Answers "give me N pages of listings for search term S" by scraping only
//! the pages not already cached, persisting them idempotently in SQLite and
//! tracking a per-query watermark. A refresh sweep re-scrapes every known
//! query on a schedule.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the entry points for easier access
pub use application::{AppState, OnDemandOrchestrator, ProductsResponse, RefreshOrchestrator, RefreshReport};
pub use domain::{HaltReason, HarvestError};
pub use infrastructure::AppConfig;

//! Infrastructure layer for database connections, scraping, and external integrations
//!
//! This module provides the SQLite store, the rate-limited HTTP client, the
//! marketplace extractor, configuration loading, logging, and CSV export.

pub mod config; // Layered configuration and compiled defaults
pub mod csv_export;
pub mod database_connection;
pub mod http_client;
pub mod logging; // Logging infrastructure
pub mod marketplace_extractor;
pub mod sqlite_listing_store;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, DatabaseConfig, LoggingConfig, ScrapingConfig};
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::init_logging_with_config;
pub use marketplace_extractor::{ListingPageParser, MarketplaceExtractor, SearchUrlBuilder};
pub use sqlite_listing_store::SqliteListingStore;

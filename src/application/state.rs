//! Application state wiring
//!
//! Builds the database, store, HTTP client, extractor and the shared pipeline
//! once, and hands out the two entry points that sit on top of them.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::on_demand::OnDemandOrchestrator;
use crate::application::refresh::RefreshOrchestrator;
use crate::application::scrape_pipeline::{PipelineSettings, ScrapePipeline};
use crate::domain::extractor::ListingExtractor;
use crate::domain::repositories::ListingStore;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::{
    DatabaseConnection, HttpClient, HttpClientConfig, MarketplaceExtractor, SqliteListingStore,
};

/// Long-lived services shared by every request and refresh sweep
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn ListingStore>,
    pub on_demand: OnDemandOrchestrator,
    pub refresh: RefreshOrchestrator,
}

impl AppState {
    /// Connects to the configured database and scrapes the live marketplace.
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        let db = DatabaseConnection::new(&config.database.url).await?;
        db.migrate().await.context("Database migration failed")?;
        info!("✅ Database ready: {}", config.database.url);

        let http = Arc::new(HttpClient::new(HttpClientConfig::from(&config.scraping))?);
        let extractor = Arc::new(MarketplaceExtractor::new(http, &config.scraping)?);
        let store = Arc::new(SqliteListingStore::new(db.pool().clone()));

        Ok(Self::with_components(config, store, extractor))
    }

    /// Wires the orchestrators around injected capabilities.
    pub fn with_components(
        config: AppConfig,
        store: Arc<dyn ListingStore>,
        extractor: Arc<dyn ListingExtractor>,
    ) -> Self {
        let settings = PipelineSettings::from(&config.scraping);
        let pipeline = Arc::new(ScrapePipeline::new(extractor, store.clone(), &settings));

        Self {
            on_demand: OnDemandOrchestrator::new(store.clone(), pipeline.clone()),
            refresh: RefreshOrchestrator::new(
                store.clone(),
                pipeline,
                settings.max_concurrent_queries,
            ),
            store,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedExtractor, TestDatabase};

    #[tokio::test]
    async fn wired_entry_points_share_one_store() {
        let db = TestDatabase::new().await.unwrap();
        let mut config = AppConfig::default();
        config.scraping.request_delay_ms = 0;
        let extractor = Arc::new(ScriptedExtractor::new().with_listings("taladro", 1..=1, 2));

        let state = AppState::with_components(config, db.store(), extractor);
        state.on_demand.get_products("taladro", 1).await.unwrap();
        let report = state.refresh.refresh_all().await.unwrap();

        assert_eq!(report.queries_processed, 1);
        assert!(state.store.find_query("taladro").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bootstrap_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database.url = format!("sqlite:{}", dir.path().join("listings.db").display());

        let state = AppState::bootstrap(config).await.unwrap();

        assert!(state.store.list_queries().await.unwrap().is_empty());
        assert!(dir.path().join("listings.db").exists());
    }
}

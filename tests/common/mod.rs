//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use listing_harvester_lib::domain::{ExtractorError, ListingExtractor, ListingStore, RawListing};
use listing_harvester_lib::infrastructure::{DatabaseConnection, SqliteListingStore};
use listing_harvester_lib::{AppConfig, AppState};

/// Scripted upstream: `Ok(vec![])` for anything not scripted
#[derive(Default)]
pub struct FakeMarketplace {
    pages: Mutex<HashMap<(String, u32), Result<Vec<RawListing>, ExtractorError>>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl FakeMarketplace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn listings(&self, term: &str, page: u32, count: usize) {
        self.set(term, page, Ok(raw_listings(page, count)));
    }

    pub fn fail(&self, term: &str, page: u32) {
        self.set(
            term,
            page,
            Err(ExtractorError::HttpStatus {
                status: 503,
                url: format!("https://listado.example/{term}/{page}"),
            }),
        );
    }

    pub fn empty(&self, term: &str, page: u32) {
        self.set(term, page, Ok(Vec::new()));
    }

    pub fn set(&self, term: &str, page: u32, answer: Result<Vec<RawListing>, ExtractorError>) {
        self.pages
            .lock()
            .unwrap()
            .insert((term.to_string(), page), answer);
    }

    pub fn fetched(&self, term: &str) -> Vec<u32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == term)
            .map(|(_, page)| *page)
            .collect()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ListingExtractor for FakeMarketplace {
    async fn fetch(&self, term: &str, page: u32) -> Result<Vec<RawListing>, ExtractorError> {
        self.calls.lock().unwrap().push((term.to_string(), page));
        self.pages
            .lock()
            .unwrap()
            .get(&(term.to_string(), page))
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn raw_listings(page: u32, count: usize) -> Vec<RawListing> {
    (0..count)
        .map(|i| RawListing {
            title: Some(format!("Taladro {page}-{i}")),
            price: Some(format!("$ {}", 150_000 + i * 1_000)),
            seller: (i % 2 == 0).then(|| "Por Bosch".to_string()),
            reviews: None,
            image_url: Some(format!("https://http2.mlstatic.com/D_{page}_{i}.webp")),
        })
        .collect()
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scraping.request_delay_ms = 0;
    config.scraping.commit_retry_backoff_ms = 0;
    config
}

pub struct Harness {
    pub state: AppState,
    pub upstream: Arc<FakeMarketplace>,
    pub store: Arc<SqliteListingStore>,
    // keeps the pool (and the in-memory database) alive
    _db: DatabaseConnection,
}

impl Harness {
    pub async fn in_memory() -> Self {
        Self::with_url("sqlite::memory:", test_config()).await
    }

    pub async fn with_url(url: &str, config: AppConfig) -> Self {
        let db = DatabaseConnection::new(url).await.expect("database");
        db.migrate().await.expect("migration");
        let store = Arc::new(SqliteListingStore::new(db.pool().clone()));
        let upstream = FakeMarketplace::new();
        let state = AppState::with_components(config, store.clone(), upstream.clone());
        Self {
            state,
            upstream,
            store,
            _db: db,
        }
    }

    pub async fn watermark(&self, term: &str) -> u32 {
        self.store
            .find_query(term)
            .await
            .unwrap()
            .map_or(0, |q| q.watermark)
    }

    pub async fn product_count(&self, term: &str) -> u64 {
        let query = self.store.find_query(term).await.unwrap().expect("query");
        self.store.count_products(query.id).await.unwrap()
    }
}

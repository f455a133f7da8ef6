//! Test utilities for the listing harvester
//!
//! Provides an isolated in-memory database and a scripted extractor so
//! pipeline tests never touch the network.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::{ExtractorError, StoreError};
use crate::domain::extractor::ListingExtractor;
use crate::domain::product::{Listing, RawListing, StoredProduct, normalize};
use crate::domain::repositories::{ListingStore, PageCommit};
use crate::domain::search_query::SearchQuery;
use crate::infrastructure::{DatabaseConnection, SqliteListingStore};

/// Test database configuration
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    /// Create a new in-memory test database.
    /// Each test gets a fresh, clean database state.
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    pub fn pool(&self) -> sqlx::SqlitePool {
        self.connection.pool().clone()
    }

    pub fn store(&self) -> Arc<SqliteListingStore> {
        Arc::new(SqliteListingStore::new(self.pool()))
    }
}

/// What the scripted extractor answers for one (term, page)
#[derive(Debug, Clone)]
pub enum ScriptedPage {
    Listings(Vec<RawListing>),
    Empty,
    Fail(ExtractorError),
    /// Sleeps before answering with an empty page
    Stall(Duration),
}

/// Extractor fake: answers from a per-page script and records every call.
/// Pages without a script answer empty.
#[derive(Default)]
pub struct ScriptedExtractor {
    script: Mutex<HashMap<(String, u32), ScriptedPage>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(self, term: &str, page: u32, answer: ScriptedPage) -> Self {
        self.script(term, page, answer);
        self
    }

    /// Scripts `per_page` distinct listings for every page in `pages`
    #[must_use]
    pub fn with_listings(self, term: &str, pages: std::ops::RangeInclusive<u32>, per_page: usize) -> Self {
        for page in pages {
            self.script(term, page, ScriptedPage::Listings(raw_listings(page, per_page)));
        }
        self
    }

    pub fn script(&self, term: &str, page: u32, answer: ScriptedPage) {
        if let Ok(mut script) = self.script.lock() {
            script.insert((term.to_string(), page), answer);
        }
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn pages_fetched(&self, term: &str) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter(|(t, _)| t == term)
            .map(|(_, page)| page)
            .collect()
    }
}

#[async_trait]
impl ListingExtractor for ScriptedExtractor {
    async fn fetch(&self, term: &str, page: u32) -> Result<Vec<RawListing>, ExtractorError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((term.to_string(), page));
        }
        let answer = self
            .script
            .lock()
            .ok()
            .and_then(|script| script.get(&(term.to_string(), page)).cloned());

        match answer {
            Some(ScriptedPage::Listings(listings)) => Ok(listings),
            Some(ScriptedPage::Fail(err)) => Err(err),
            Some(ScriptedPage::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Vec::new())
            }
            Some(ScriptedPage::Empty) | None => Ok(Vec::new()),
        }
    }
}

/// `count` distinct raw listings for `page`
pub fn raw_listings(page: u32, count: usize) -> Vec<RawListing> {
    (0..count)
        .map(|i| RawListing {
            title: Some(format!("Producto {page}-{i}")),
            price: Some(format!("$ {}", 10_000 + i * 500)),
            seller: Some("Por Tienda Oficial".to_string()),
            reviews: Some("Calificación 4.5 de 5".to_string()),
            image_url: Some(format!("https://http2.mlstatic.com/D_{page}_{i}.webp")),
        })
        .collect()
}

/// Normalised counterpart of [`raw_listings`]
pub fn listings(page: u32, count: usize) -> Vec<Listing> {
    raw_listings(page, count).into_iter().map(normalize).collect()
}

/// Store wrapper whose first `conflicts` commits lose the watermark race
pub struct ConflictingStore {
    inner: Arc<dyn ListingStore>,
    conflicts_remaining: AtomicU32,
    commit_attempts: AtomicU32,
}

impl ConflictingStore {
    pub fn new(inner: Arc<dyn ListingStore>, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts_remaining: AtomicU32::new(conflicts),
            commit_attempts: AtomicU32::new(0),
        }
    }

    pub fn commit_attempts(&self) -> u32 {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingStore for ConflictingStore {
    async fn get_or_create_query(&self, term: &str) -> Result<SearchQuery, StoreError> {
        self.inner.get_or_create_query(term).await
    }

    async fn find_query(&self, term: &str) -> Result<Option<SearchQuery>, StoreError> {
        self.inner.find_query(term).await
    }

    async fn list_queries(&self) -> Result<Vec<SearchQuery>, StoreError> {
        self.inner.list_queries().await
    }

    async fn commit_pages(
        &self,
        query_id: i64,
        pages: &BTreeMap<u32, Vec<Listing>>,
        highest_page: u32,
        attempted_at: DateTime<Utc>,
    ) -> Result<PageCommit, StoreError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let lost_race = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lost_race {
            return Err(StoreError::Conflict);
        }
        self.inner
            .commit_pages(query_id, pages, highest_page, attempted_at)
            .await
    }

    async fn products_through_page(
        &self,
        query_id: i64,
        max_page: u32,
    ) -> Result<Vec<StoredProduct>, StoreError> {
        self.inner.products_through_page(query_id, max_page).await
    }

    async fn count_products(&self, query_id: i64) -> Result<u64, StoreError> {
        self.inner.count_products(query_id).await
    }

    async fn delete_query(&self, term: &str) -> Result<bool, StoreError> {
        self.inner.delete_query(term).await
    }
}

//! Repository interfaces for listing persistence
//!
//! The store is a transactional relational backend used through CRUD-shaped
//! operations plus one atomic "commit pages and advance watermark" primitive.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StoreError;
use crate::domain::product::{Listing, StoredProduct};
use crate::domain::search_query::SearchQuery;

/// Result of one atomic page commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCommit {
    pub previous_watermark: u32,
    pub watermark: u32,
    /// Rows that did not exist before the commit (pre/post count delta)
    pub rows_added: u64,
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Idempotent get-or-create by normalised term
    async fn get_or_create_query(&self, term: &str) -> Result<SearchQuery, StoreError>;
    async fn find_query(&self, term: &str) -> Result<Option<SearchQuery>, StoreError>;
    /// Every stored query, ordered by term
    async fn list_queries(&self) -> Result<Vec<SearchQuery>, StoreError>;

    /// In one transaction: insert-if-absent every listing of every page, then
    /// set `watermark = max(current, highest_page)` and `last_updated =
    /// attempted_at` with compare-and-swap on the watermark that was read.
    ///
    /// Returns `StoreError::Conflict` (and writes nothing) if the swap lost a race.
    async fn commit_pages(
        &self,
        query_id: i64,
        pages: &BTreeMap<u32, Vec<Listing>>,
        highest_page: u32,
        attempted_at: DateTime<Utc>,
    ) -> Result<PageCommit, StoreError>;

    /// Products with `page <= max_page`, ordered by page then insertion order
    async fn products_through_page(
        &self,
        query_id: i64,
        max_page: u32,
    ) -> Result<Vec<StoredProduct>, StoreError>;

    async fn count_products(&self, query_id: i64) -> Result<u64, StoreError>;

    /// Deletes a query together with its products (cascade). Returns whether it existed.
    async fn delete_query(&self, term: &str) -> Result<bool, StoreError>;
}

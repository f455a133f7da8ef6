//! SQLite implementation of the `ListingStore` capability
//!
//! Watermark advancement is a compare-and-swap inside the same transaction
//! that inserts the listings, so a page batch and its watermark move together.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::errors::StoreError;
use crate::domain::product::{Listing, StoredProduct, dedup_page};
use crate::domain::repositories::{ListingStore, PageCommit};
use crate::domain::search_query::SearchQuery;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // Extended result codes keep the primary code in the low byte
            let primary = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED)) {
                return StoreError::Conflict;
            }
        }
        StoreError::Database(err.to_string())
    }
}

#[derive(Clone)]
pub struct SqliteListingStore {
    pool: Arc<SqlitePool>,
}

impl SqliteListingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    fn map_query(row: &SqliteRow) -> Result<SearchQuery, StoreError> {
        Ok(SearchQuery {
            id: row.try_get("id")?,
            search_term: row.try_get("search_term")?,
            watermark: to_page(row.try_get("watermark")?)?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    fn map_product(row: &SqliteRow) -> Result<StoredProduct, StoreError> {
        Ok(StoredProduct {
            id: row.try_get("id")?,
            search_query_id: row.try_get("search_query_id")?,
            page: to_page(row.try_get("page")?)?,
            title: row.try_get("title")?,
            price: row.try_get("price")?,
            seller: row.try_get("seller")?,
            reviews_summary: row.try_get("reviews")?,
            image_url: row.try_get("image_url")?,
            scraped_at: row.try_get("scraped_at")?,
        })
    }
}

fn to_page(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Database(format!("page value out of range: {value}")))
}

#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn get_or_create_query(&self, term: &str) -> Result<SearchQuery, StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO search_queries (search_term, watermark, last_updated) VALUES (?, 0, ?)",
        )
        .bind(term)
        .bind(Utc::now())
        .execute(&*self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, search_term, watermark, last_updated FROM search_queries WHERE search_term = ?",
        )
        .bind(term)
        .fetch_one(&*self.pool)
        .await?;

        Self::map_query(&row)
    }

    async fn find_query(&self, term: &str) -> Result<Option<SearchQuery>, StoreError> {
        let row = sqlx::query(
            "SELECT id, search_term, watermark, last_updated FROM search_queries WHERE search_term = ?",
        )
        .bind(term)
        .fetch_optional(&*self.pool)
        .await?;

        row.as_ref().map(Self::map_query).transpose()
    }

    async fn list_queries(&self) -> Result<Vec<SearchQuery>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, search_term, watermark, last_updated FROM search_queries ORDER BY search_term",
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(Self::map_query).collect()
    }

    async fn commit_pages(
        &self,
        query_id: i64,
        pages: &BTreeMap<u32, Vec<Listing>>,
        highest_page: u32,
        attempted_at: DateTime<Utc>,
    ) -> Result<PageCommit, StoreError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<i64> =
            sqlx::query_scalar("SELECT watermark FROM search_queries WHERE id = ?")
                .bind(query_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(previous) = previous else {
            tx.rollback().await?;
            return Err(StoreError::QueryNotFound(query_id));
        };
        let previous_watermark = to_page(previous)?;

        let rows_before: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE search_query_id = ?")
                .bind(query_id)
                .fetch_one(&mut *tx)
                .await?;

        for (page, listings) in pages {
            for listing in dedup_page(query_id, *page, listings) {
                sqlx::query(
                    r"
                    INSERT OR IGNORE INTO products
                    (search_query_id, page, title, price, seller, reviews, image_url, scraped_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    ",
                )
                .bind(query_id)
                .bind(i64::from(*page))
                .bind(&listing.title)
                .bind(&listing.price)
                .bind(&listing.seller)
                .bind(&listing.reviews_summary)
                .bind(&listing.image_url)
                .bind(attempted_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        let rows_after: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE search_query_id = ?")
                .bind(query_id)
                .fetch_one(&mut *tx)
                .await?;

        let watermark = previous_watermark.max(highest_page);
        let updated = sqlx::query(
            "UPDATE search_queries SET watermark = ?, last_updated = ? WHERE id = ? AND watermark = ?",
        )
        .bind(i64::from(watermark))
        .bind(attempted_at)
        .bind(query_id)
        .bind(previous)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::debug!(query_id, "Watermark moved during commit, rolling back");
            return Err(StoreError::Conflict);
        }

        tx.commit().await?;

        Ok(PageCommit {
            previous_watermark,
            watermark,
            rows_added: u64::try_from(rows_after - rows_before).unwrap_or(0),
        })
    }

    async fn products_through_page(
        &self,
        query_id: i64,
        max_page: u32,
    ) -> Result<Vec<StoredProduct>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, search_query_id, page, title, price, seller, reviews, image_url, scraped_at
            FROM products
            WHERE search_query_id = ? AND page <= ?
            ORDER BY page, id
            ",
        )
        .bind(query_id)
        .bind(i64::from(max_page))
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(Self::map_product).collect()
    }

    async fn count_products(&self, query_id: i64) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE search_query_id = ?")
            .bind(query_id)
            .fetch_one(&*self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn delete_query(&self, term: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM search_queries WHERE search_term = ?")
            .bind(term)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

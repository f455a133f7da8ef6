// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = is_in_memory(database_url);

        if !in_memory {
            let db_path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let db_path = db_path.split('?').next().unwrap_or(db_path);

            // Create database file directory if it doesn't exist
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create database directory {parent:?}"))?;
                }
            }
        }

        let mut options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its connection, so the pool
        // must hold exactly one connection forever.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(10)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_search_queries_sql = r"
            CREATE TABLE IF NOT EXISTS search_queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_term TEXT NOT NULL UNIQUE,
                watermark INTEGER NOT NULL DEFAULT 0 CHECK (watermark >= 0),
                last_updated TEXT NOT NULL
            )
        ";

        let create_products_sql = r"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                search_query_id INTEGER NOT NULL,
                page INTEGER NOT NULL CHECK (page >= 1),
                title TEXT NOT NULL,
                price TEXT NOT NULL,
                seller TEXT,
                reviews TEXT,
                image_url TEXT,
                scraped_at TEXT NOT NULL,
                FOREIGN KEY (search_query_id) REFERENCES search_queries (id) ON DELETE CASCADE
            )
        ";

        // A missing image is one identity value, not a fresh NULL each time
        let create_dedup_index_sql = r"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_products_dedup_key
            ON products (search_query_id, page, title, COALESCE(image_url, ''))
        ";

        let create_page_index_sql = r"
            CREATE INDEX IF NOT EXISTS idx_products_query_page
            ON products (search_query_id, page)
        ";

        sqlx::query(create_search_queries_sql).execute(&self.pool).await?;
        sqlx::query(create_products_sql).execute(&self.pool).await?;
        sqlx::query(create_dedup_index_sql).execute(&self.pool).await?;
        sqlx::query(create_page_index_sql).execute(&self.pool).await?;

        tracing::debug!("Database schema is up to date");
        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when the extractor could not find a title or a price
pub const UNAVAILABLE: &str = "N/A";

/// Listing fields as handed over by the extractor. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: Option<String>,
    pub price: Option<String>,
    pub seller: Option<String>,
    pub reviews: Option<String>,
    pub image_url: Option<String>,
}

/// Canonical listing shape stored per page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    /// Display text, never parsed (`$ 1.234.567`, `US$ 12,99`, ...)
    pub price: String,
    pub seller: Option<String>,
    #[serde(rename = "reviewsSummary")]
    pub reviews_summary: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

/// Total normalisation: garbage in is tolerated, never rejected.
pub fn normalize(raw: RawListing) -> Listing {
    Listing {
        title: present(raw.title).unwrap_or_else(|| UNAVAILABLE.to_string()),
        price: present(raw.price).unwrap_or_else(|| UNAVAILABLE.to_string()),
        seller: present(raw.seller),
        reviews_summary: present(raw.reviews),
        image_url: present(raw.image_url),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Storage identity of a listing: (query, page, title, image url).
///
/// There is no stable upstream product id, so title + image is a heuristic
/// fingerprint. Two distinct listings sharing a title and both missing an
/// image collapse into one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub query_id: i64,
    pub page: u32,
    pub title: String,
    pub image_url: Option<String>,
}

impl DedupKey {
    pub fn for_listing(query_id: i64, page: u32, listing: &Listing) -> Self {
        Self {
            query_id,
            page,
            title: listing.title.clone(),
            image_url: listing.image_url.clone(),
        }
    }
}

/// Drops repeated listings inside one page batch, keeping the first occurrence.
pub fn dedup_page(query_id: i64, page: u32, listings: &[Listing]) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .iter()
        .filter(|listing| seen.insert(DedupKey::for_listing(query_id, page, listing)))
        .cloned()
        .collect()
}

/// Listing row as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: i64,
    #[serde(rename = "searchQueryId")]
    pub search_query_id: i64,
    pub page: u32,
    pub title: String,
    pub price: String,
    pub seller: Option<String>,
    #[serde(rename = "reviewsSummary")]
    pub reviews_summary: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: DateTime<Utc>,
}

/// Column order expected by existing CSV consumers
pub const EXPORT_HEADER: [&str; 6] = ["page", "title", "price", "seller", "reviews", "image_url"];

/// One exported row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub page: u32,
    pub title: String,
    pub price: String,
    pub seller: Option<String>,
    #[serde(rename = "reviews")]
    pub reviews_summary: Option<String>,
    pub image_url: Option<String>,
}

impl From<StoredProduct> for ExportRow {
    fn from(product: StoredProduct) -> Self {
        Self {
            page: product.page,
            title: product.title,
            price: product.price,
            seller: product.seller,
            reviews_summary: product.reviews_summary,
            image_url: product.image_url,
        }
    }
}

//! Domain module - Core business logic and entities
//!
//! This module contains the listing/query entities, the watermark rules and
//! the capability traits (extractor, store) the pipeline is built on.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod errors;
pub mod extractor;
pub mod halt_reason;
pub mod product;
pub mod repositories;
pub mod search_query;

// Note: Be specific about re-exports to avoid ambiguous glob warnings
pub use errors::{ExtractorError, HarvestError, StoreError};
pub use extractor::ListingExtractor;
pub use halt_reason::HaltReason;
pub use product::{
    DedupKey, EXPORT_HEADER, ExportRow, Listing, RawListing, StoredProduct, UNAVAILABLE,
    dedup_page, normalize,
};
pub use repositories::{ListingStore, PageCommit};
pub use search_query::{SearchQuery, normalize_term, parse_pages_required};

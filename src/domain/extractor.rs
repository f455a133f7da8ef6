//! Extractor capability: the opaque "fetch page N of term S" step
//!
//! Implementations live in the infrastructure layer; the pipeline only ever
//! sees this trait, injected at construction time.

use async_trait::async_trait;

use crate::domain::errors::ExtractorError;
use crate::domain::product::RawListing;

#[async_trait]
pub trait ListingExtractor: Send + Sync {
    /// Returns an empty vector (not an error) when the page legitimately has
    /// no results. Errors are reserved for transport and parse failures.
    async fn fetch(&self, term: &str, page: u32) -> Result<Vec<RawListing>, ExtractorError>;
}

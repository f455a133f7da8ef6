//! Error taxonomy for the scrape-cache-serve pipeline
//!
//! - `ExtractorError`: a single page fetch failed (transport, HTTP status, markup)
//! - `StoreError`: the persistence capability failed or lost a watermark race
//! - `HarvestError`: what the orchestrators surface to their callers

use thiserror::Error;

/// Failure of the external extractor for one page.
///
/// An empty result page is NOT an error; extractors return `Ok(vec![])` for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractorError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP request failed with status {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Persistence layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The watermark moved underneath us, or the database was busy/locked.
    #[error("Concurrent watermark update detected")]
    Conflict,

    #[error("Search query {0} does not exist")]
    QueryNotFound(i64),

    #[error("Database error: {0}")]
    Database(String),
}

/// Errors surfaced by the on-demand and refresh entry points
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarvestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("No products found for '{term}' up to page {max_page} after attempting scrape")]
    NotFound { term: String, max_page: u32 },

    #[error("Storage conflict persisted after {attempts} attempts")]
    StorageConflict { attempts: u32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarvestError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Boundary mapping: anything that is not a caller-facing condition
    /// collapses into `Internal` with a generic message.
    #[must_use]
    pub fn into_boundary(self) -> Self {
        match self {
            Self::StorageConflict { .. } | Self::Internal(_) => {
                Self::Internal("An internal server error occurred.".to_string())
            }
            other => other,
        }
    }
}

impl From<StoreError> for HarvestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::StorageConflict { attempts: 1 },
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_maps_to_storage_conflict() {
        let err: HarvestError = StoreError::Conflict.into();
        assert_eq!(err, HarvestError::StorageConflict { attempts: 1 });
    }

    #[test]
    fn boundary_hides_internal_details() {
        let err = HarvestError::internal("database is on fire").into_boundary();
        assert_eq!(
            err,
            HarvestError::Internal("An internal server error occurred.".to_string())
        );

        let conflict = HarvestError::StorageConflict { attempts: 3 }.into_boundary();
        assert!(matches!(conflict, HarvestError::Internal(_)));
    }

    #[test]
    fn caller_facing_errors_pass_through_boundary() {
        let not_found = HarvestError::NotFound {
            term: "taladro".into(),
            max_page: 2,
        };
        assert_eq!(not_found.clone().into_boundary(), not_found);
        assert!(not_found.to_string().contains("taladro"));
    }
}

use concierge_core::ConciergeError;
use thiserror::Error;

/// Errors raised while loading or querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The store cannot answer right now (lock poisoned, task aborted).
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// The catalog source could not be read or is malformed.
    #[error("catalog load failed: {0}")]
    Load(String),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

impl From<CatalogError> for ConciergeError {
    fn from(err: CatalogError) -> Self {
        ConciergeError::Catalog(err.to_string())
    }
}

impl From<csv::Error> for CatalogError {
    fn from(err: csv::Error) -> Self {
        CatalogError::Load(err.to_string())
    }
}

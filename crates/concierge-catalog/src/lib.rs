//! Concierge catalog crate - embeddings, in-memory vector index, CSV loading,
//! and the catalog store used to ground recommendations.
//!
//! The catalog is read-only once loaded. `VectorCatalog` embeds every item at
//! startup and answers `search` with cosine similarity over the index.

pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod store;

pub use embedding::{
    embedder_for_dir, DynEmbeddingService, EmbeddingService, HashingEmbedding,
    OnnxEmbeddingService,
};
pub use error::CatalogError;
pub use index::{IndexHit, VectorIndex};
pub use loader::load_catalog_csv;
pub use store::{CatalogStore, VectorCatalog};

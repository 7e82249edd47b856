//! The catalog store: the read-only source of truth for grounded replies.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use async_trait::async_trait;
use concierge_core::{CatalogHit, CatalogItem};
use tracing::{debug, info};

use crate::embedding::DynEmbeddingService;
use crate::error::CatalogError;
use crate::index::VectorIndex;
use crate::loader::load_catalog_csv;

/// Similarity search over catalog records.
///
/// Implementations are shared read-only across all sessions.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Up to `top_k` records most similar to `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<CatalogHit>, CatalogError>;

    /// Look up a record by id.
    fn get(&self, id: &str) -> Option<CatalogItem>;

    /// Number of records in the catalog.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct lowercase locations across the catalog.
    fn locations(&self) -> Vec<String>;

    /// Name of the embedding model backing the search.
    fn model_name(&self) -> String;
}

/// Catalog held in memory and searched through a [`VectorIndex`].
pub struct VectorCatalog {
    items: HashMap<String, CatalogItem>,
    index: VectorIndex,
    embedder: Box<dyn DynEmbeddingService>,
}

impl VectorCatalog {
    /// Embed and index every item.
    pub async fn build(
        items: Vec<CatalogItem>,
        embedder: Box<dyn DynEmbeddingService>,
    ) -> Result<Self, CatalogError> {
        let index = VectorIndex::new();
        let mut by_id = HashMap::with_capacity(items.len());

        for item in items {
            let vector = embedder.embed_boxed(&item.document_text()).await?;
            index.insert(item.id.clone(), vector)?;
            by_id.insert(item.id.clone(), item);
        }

        info!(
            items = by_id.len(),
            model = embedder.model_name(),
            "Catalog indexed"
        );

        Ok(Self {
            items: by_id,
            index,
            embedder,
        })
    }

    /// Load the CSV at `path` and index it.
    pub async fn from_csv(
        path: &Path,
        embedder: Box<dyn DynEmbeddingService>,
    ) -> Result<Self, CatalogError> {
        let items = load_catalog_csv(path)?;
        Self::build(items, embedder).await
    }
}

/// Similarity as a percentage rounded to two decimals.
fn percent_score(similarity: f64) -> f64 {
    (similarity * 100.0 * 100.0).round() / 100.0
}

#[async_trait]
impl CatalogStore for VectorCatalog {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<CatalogHit>, CatalogError> {
        if top_k == 0 || self.items.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_boxed(query).await?;
        let hits = self.index.search(&query_vec, top_k)?;

        let results: Vec<CatalogHit> = hits
            .into_iter()
            .filter_map(|hit| {
                self.items.get(&hit.id).map(|item| CatalogHit {
                    item: item.clone(),
                    score: percent_score(hit.similarity),
                })
            })
            .collect();

        debug!(hits = results.len(), top_k, "Catalog search");
        Ok(results)
    }

    fn get(&self, id: &str) -> Option<CatalogItem> {
        self.items.get(id).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn locations(&self) -> Vec<String> {
        self.items
            .values()
            .map(|item| item.location.trim().to_lowercase())
            .filter(|loc| !loc.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn model_name(&self) -> String {
        self.embedder.model_name().to_string()
    }
}

//! In-memory vector index with brute-force cosine similarity search.
//!
//! Catalogs are small (hundreds to a few thousand items), so an O(n) scan per
//! query is well within the search timeout.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::CatalogError;

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Catalog item id of the matching entry.
    pub id: String,
    /// Cosine similarity in [-1.0, 1.0].
    pub similarity: f64,
}

/// In-memory vector index keyed by catalog item id.
///
/// Thread-safe via interior RwLock; cloning shares the same entries.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Arc<RwLock<HashMap<String, Vec<f32>>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vector, overwriting any existing entry with the same id.
    pub fn insert(&self, id: impl Into<String>, embedding: Vec<f32>) -> Result<(), CatalogError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CatalogError::Unavailable(format!("Lock poisoned: {}", e)))?;
        entries.insert(id.into(), embedding);
        Ok(())
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Equal scores are ordered by id so results are stable across calls.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, CatalogError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| CatalogError::Unavailable(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<IndexHit> = entries
            .iter()
            .map(|(id, embedding)| IndexHit {
                id: id.clone(),
                similarity: cosine_similarity(query, embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine similarity between two vectors; 0.0 if either has zero magnitude
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

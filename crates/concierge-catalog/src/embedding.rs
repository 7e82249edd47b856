//! Embedding service trait and implementations.
//!
//! - `OnnxEmbeddingService` runs a sentence-transformer ONNX export (for
//!   example all-MiniLM-L6-v2) through ort, tokenizing with the HuggingFace
//!   tokenizers crate.
//! - `HashingEmbedding` is a deterministic feature-hashing bag-of-words
//!   embedding. It needs no model files and is used when no model directory
//!   is configured.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::{info, warn};

use crate::error::CatalogError;

/// Dimensionality shared by the hashing embedding and MiniLM-class models.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Service for generating text embeddings.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, CatalogError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Human-readable model name, reported by the service info endpoint.
    fn model_name(&self) -> &str;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, so it cannot be used as a
/// trait object. This trait boxes the future instead. Every
/// `EmbeddingService` implements it through the blanket impl below.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, CatalogError>> + Send + 'a>>;

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, CatalogError>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn model_name(&self) -> &str {
        EmbeddingService::model_name(self)
    }
}

/// Pick the embedding backend for `model_dir`.
///
/// An empty directory string selects [`HashingEmbedding`]. A directory that
/// fails to load is logged and also falls back to hashing, so a missing model
/// never prevents the service from starting.
pub fn embedder_for_dir(model_dir: &str) -> Box<dyn DynEmbeddingService> {
    if model_dir.trim().is_empty() {
        info!("No embedding model configured, using hashing embedding");
        return Box::new(HashingEmbedding::new());
    }
    match OnnxEmbeddingService::from_directory(Path::new(model_dir)) {
        Ok(service) => Box::new(service),
        Err(e) => {
            warn!(model_dir, error = %e, "Falling back to hashing embedding");
            Box::new(HashingEmbedding::new())
        }
    }
}

fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in values.iter_mut() {
            *val /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - real ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX Runtime-backed embedding service using a sentence-transformer model.
///
/// Expects a model directory containing:
/// - `model.onnx`: the sentence-transformer ONNX export
/// - `tokenizer.json`: the HuggingFace fast-tokenizer file
///
/// Token embeddings are mean-pooled under the attention mask and
/// L2-normalized.
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
    name: String,
}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("name", &self.name)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load a sentence-transformer model from the given directory.
    pub fn from_directory(model_dir: &Path) -> Result<Self, CatalogError> {
        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
            name,
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        name: String,
    ) -> Result<Self, CatalogError> {
        if !model_path.exists() {
            return Err(CatalogError::Embedding(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(CatalogError::Embedding(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| CatalogError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| CatalogError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| CatalogError::Embedding(format!("ONNX load model: {}", e)))?;

        // Output is [batch, seq_len, hidden_dim].
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { DEFAULT_DIMENSIONS })
            .unwrap_or(DEFAULT_DIMENSIONS);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| CatalogError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            model = %model_path.display(),
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
            name,
        })
    }

    fn embed_sync(
        session: &Mutex<Session>,
        tokenizer: &Tokenizer,
        text: &str,
    ) -> Result<Vec<f32>, CatalogError> {
        if text.trim().is_empty() {
            return Err(CatalogError::Embedding("Cannot embed empty text".to_string()));
        }

        let encoding = tokenizer
            .encode(text, true)
            .map_err(|e| CatalogError::Embedding(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();

        let seq_len = input_ids.len();
        let shape_err = |e: ndarray::ShapeError| CatalogError::Embedding(format!("input shape: {}", e));
        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids).map_err(shape_err)?;
        let mask_array =
            ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone()).map_err(shape_err)?;
        let type_array =
            ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids).map_err(shape_err)?;

        let tensor_err = |e: ort::Error| CatalogError::Embedding(format!("input tensor: {}", e));
        let ids_ref = TensorRef::from_array_view(&ids_array).map_err(tensor_err)?;
        let mask_ref = TensorRef::from_array_view(&mask_array).map_err(tensor_err)?;
        let type_ref = TensorRef::from_array_view(&type_array).map_err(tensor_err)?;

        let mut session = session
            .lock()
            .map_err(|e| CatalogError::Unavailable(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| CatalogError::Embedding(format!("ONNX inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| CatalogError::Embedding(format!("Extract embeddings: {}", e)))?;

        let hidden_dim = match shape.iter().copied().collect::<Vec<i64>>().as_slice() {
            [_, .., last] if *last > 0 => *last as usize,
            other => {
                return Err(CatalogError::Embedding(format!(
                    "Unexpected output shape: {:?}",
                    other
                )))
            }
        };

        mean_pool(data, &attention_mask, hidden_dim)
    }
}

/// Average the token vectors of a `[1, seq_len, hidden_dim]` output over the
/// unmasked tokens, then L2-normalize.
fn mean_pool(data: &[f32], mask: &[i64], hidden_dim: usize) -> Result<Vec<f32>, CatalogError> {
    if hidden_dim == 0 || data.len() < mask.len() * hidden_dim {
        return Err(CatalogError::Embedding(format!(
            "Output holds {} values, expected {} tokens x {} dims",
            data.len(),
            mask.len(),
            hidden_dim
        )));
    }

    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0usize;
    for (token, row) in data.chunks_exact(hidden_dim).zip(mask) {
        if *row > 0 {
            for (slot, value) in pooled.iter_mut().zip(token) {
                *slot += value;
            }
            count += 1;
        }
    }
    if count > 0 {
        for val in &mut pooled {
            *val /= count as f32;
        }
    }

    l2_normalize(&mut pooled);
    Ok(pooled)
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CatalogError> {
        // Inference is CPU-bound; run it on a blocking thread.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || Self::embed_sync(&session, &tokenizer, &text_owned))
            .await
            .map_err(|e| CatalogError::Unavailable(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedding - model-free bag-of-words vectors
// ---------------------------------------------------------------------------

/// Feature-hashing embedding over lowercase word unigrams and bigrams.
///
/// Each feature is hashed into one of `dimensions` buckets with a hash-derived
/// sign, then the vector is L2-normalized. Texts sharing vocabulary get a
/// positive cosine similarity; identical texts embed identically.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| {
                let lower = w.to_lowercase();
                // Fold simple plurals so "tours" and "tour" share a bucket.
                match lower.strip_suffix('s') {
                    Some(stem) if stem.len() > 3 && !stem.ends_with('s') => stem.to_string(),
                    _ => lower,
                }
            })
            .collect()
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % self.dimensions as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokens(text);
        let mut vector = vec![0.0f32; self.dimensions];
        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CatalogError> {
        if text.trim().is_empty() {
            return Err(CatalogError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

//! Embedding provider trait and implementations.
//!
//! - `OnnxEmbeddingProvider` loads a sentence-transformer ONNX model (e.g.
//!   all-MiniLM-L6-v2) via ort and tokenizes with the HuggingFace tokenizers
//!   crate. This is the production backend.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Mutex;

use embedvault_core::error::{EmbedVaultError, Result};
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Converts text into fixed-dimensional vectors.
///
/// Calls block until the vector is ready. The dimension is fixed for the
/// lifetime of a provider.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded alongside every stored vector.
    fn name(&self) -> &str;

    /// Longest token sequence the model reads; longer input is truncated.
    fn max_seq_length(&self) -> usize;
}

fn provider_err(context: &str, e: impl std::fmt::Display) -> EmbedVaultError {
    EmbedVaultError::Provider(format!("{}: {}", context, e))
}

/// L2-normalize in place. Zero vectors are left untouched.
fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingProvider - ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX Runtime-backed provider using a sentence-transformer model.
///
/// Expects a model directory containing:
/// - `model.onnx` - the sentence-transformer ONNX export
/// - `tokenizer.json` - the HuggingFace fast-tokenizer file
///
/// The model should accept `input_ids`, `attention_mask`, and
/// `token_type_ids` as i64 inputs and produce token-level embeddings.
/// Masked mean pooling followed by L2 normalisation yields one vector per
/// input, matching sentence-transformers' default pipeline.
pub struct OnnxEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    name: String,
    dimensions: usize,
    max_seq_length: usize,
}

// ort::Session is Send + Sync internally (uses Arc<SharedSessionInner>).
unsafe impl Send for OnnxEmbeddingProvider {}
unsafe impl Sync for OnnxEmbeddingProvider {}

impl std::fmt::Debug for OnnxEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingProvider")
            .field("name", &self.name)
            .field("dimensions", &self.dimensions)
            .field("max_seq_length", &self.max_seq_length)
            .finish()
    }
}

impl OnnxEmbeddingProvider {
    /// Load a sentence-transformer model from the given directory.
    ///
    /// The directory must contain `model.onnx` and `tokenizer.json`.
    pub fn from_directory(
        model_dir: &Path,
        name: impl Into<String>,
        max_seq_length: usize,
    ) -> Result<Self> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
            name,
            max_seq_length,
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        name: impl Into<String>,
        max_seq_length: usize,
    ) -> Result<Self> {
        if !model_path.exists() {
            return Err(EmbedVaultError::Provider(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(EmbedVaultError::Provider(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }
        if max_seq_length == 0 {
            return Err(EmbedVaultError::Config(
                "model.max_seq_length must be greater than zero".to_string(),
            ));
        }

        let session = Session::builder()
            .map_err(|e| provider_err("ONNX session builder", e))?
            .with_intra_threads(1)
            .map_err(|e| provider_err("ONNX set threads", e))?
            .commit_from_file(model_path)
            .map_err(|e| provider_err("ONNX load model", e))?;

        // Sentence-transformer output is [batch, seq_len, hidden_dim].
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { 384 })
            .unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| provider_err("Failed to load tokenizer", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_length,
                ..Default::default()
            }))
            .map_err(|e| provider_err("Failed to configure truncation", e))?;

        let name = name.into();
        info!(
            model = %model_path.display(),
            name = %name,
            dimensions,
            max_seq_length,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            name,
            dimensions,
            max_seq_length,
        })
    }
}

impl EmbeddingProvider for OnnxEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| provider_err("Tokenization failed", e))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| t as i64)
            .collect();

        let seq_len = input_ids.len();
        debug!(tokens = seq_len, "Tokenized input");

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| provider_err("input_ids array", e))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| provider_err("attention_mask array", e))?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| provider_err("token_type_ids array", e))?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| provider_err("TensorRef input_ids", e))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| provider_err("TensorRef attention_mask", e))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| provider_err("TensorRef token_type_ids", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| provider_err("Session lock poisoned", e))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| provider_err("ONNX inference failed", e))?;

        // Flat token embeddings: [1, seq_len, hidden_dim].
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| provider_err("Extract embeddings", e))?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        let hidden_dim = match shape_dims.as_slice() {
            [.., last] if shape_dims.len() >= 2 && *last > 0 => *last as usize,
            _ => {
                return Err(EmbedVaultError::Provider(format!(
                    "Unexpected output shape: {:?}",
                    shape_dims
                )))
            }
        };
        if hidden_dim != self.dimensions {
            return Err(EmbedVaultError::Provider(format!(
                "Model produced {} dimensions, expected {}",
                hidden_dim, self.dimensions
            )));
        }

        // Mean pooling over the sequence dimension, masked by attention_mask.
        let mut pooled = vec![0.0f32; hidden_dim];
        let mut count = 0.0f32;

        for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
            if mask_val > 0 {
                let offset = tok_idx * hidden_dim;
                for (dim, slot) in pooled.iter_mut().enumerate() {
                    *slot += data[offset + dim];
                }
                count += 1.0;
            }
        }

        if count > 0.0 {
            for val in &mut pooled {
                *val /= count;
            }
        }

        normalize(&mut pooled);
        Ok(pooled)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_seq_length(&self) -> usize {
        self.max_seq_length
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock provider that returns deterministic unit vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs. This allows testing storage and search
/// without a real model.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    name: String,
    dimensions: usize,
}

impl MockEmbedding {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    pub fn new(dimensions: usize) -> Self {
        Self {
            name: "mock".to_string(),
            dimensions,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }
        normalize(&mut result);
        result
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingProvider for MockEmbedding {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(EmbedVaultError::Provider(
                "Mock provider configured with zero dimensions".to_string(),
            ));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_seq_length(&self) -> usize {
        256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_embedding_dimension() {
        let provider = MockEmbedding::default();
        assert_eq!(provider.embed("hello world").unwrap().len(), 384);

        let small = MockEmbedding::new(8);
        assert_eq!(small.embed("hello world").unwrap().len(), 8);
        assert_eq!(small.dimensions(), 8);
    }

    #[test]
    fn test_mock_embedding_deterministic() {
        let provider = MockEmbedding::new(32);
        let v1 = provider.embed("same text").unwrap();
        let v2 = provider.embed("same text").unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_mock_embedding_different_inputs() {
        let provider = MockEmbedding::new(32);
        let v1 = provider.embed("text one").unwrap();
        let v2 = provider.embed("text two").unwrap();
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_mock_embedding_empty_text() {
        let provider = MockEmbedding::new(16);
        let vec = provider.embed("").unwrap();
        assert_eq!(vec.len(), 16);
    }

    #[test]
    fn test_mock_embedding_unit_norm() {
        let provider = MockEmbedding::new(64);
        let vec = provider.embed("test range").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        for val in &vec {
            assert!(*val >= -1.0 && *val <= 1.0, "Value {} out of range", val);
        }
    }

    #[test]
    fn test_mock_zero_dimensions_fails() {
        let provider = MockEmbedding::new(0);
        assert!(matches!(
            provider.embed("x"),
            Err(EmbedVaultError::Provider(_))
        ));
    }

    #[test]
    fn test_mock_name() {
        assert_eq!(MockEmbedding::default().name(), "mock");
        let named = MockEmbedding::new(4).with_name("all-MiniLM-L6-v2");
        assert_eq!(named.name(), "all-MiniLM-L6-v2");
        assert_eq!(named.max_seq_length(), 256);
    }

    #[test]
    fn test_provider_is_object_safe() {
        let provider: Box<dyn EmbeddingProvider> = Box::new(MockEmbedding::new(4));
        assert_eq!(provider.embed("x").unwrap().len(), 4);
    }

    #[test]
    fn test_onnx_missing_model() {
        let result =
            OnnxEmbeddingProvider::from_directory(Path::new("/nonexistent"), "missing", 256);
        assert!(matches!(result, Err(EmbedVaultError::Provider(_))));
    }
}

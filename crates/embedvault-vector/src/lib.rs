//! Embedvault Vector crate - embedding providers, generation, ingestion and search.
//!
//! Provides the embedding provider trait with ONNX and mock implementations,
//! the statistics-keeping generator that persists records, the batched
//! ingestion pipeline, the search pipeline, and the `EmbeddingManager`
//! facade tying them to a vector store.

pub mod embedding;
pub mod generator;
pub mod manager;
pub mod pipeline;
pub mod search;

pub use embedding::{EmbeddingProvider, MockEmbedding, OnnxEmbeddingProvider};
pub use generator::EmbeddingGenerator;
pub use manager::EmbeddingManager;
pub use pipeline::{IngestReport, IngestionPipeline};
pub use search::SearchPipeline;

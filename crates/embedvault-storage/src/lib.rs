//! Embedvault Storage crate - record files on disk and vector stores.
//!
//! Provides the per-record JSON writer and inspector, the [`VectorStore`]
//! trait, an in-memory backend, and a persistent WAL-mode SQLite backend
//! with migrations.

pub mod db;
pub mod inspector;
pub mod memory;
pub mod migrations;
pub mod records;
pub mod sqlite;
pub mod store;

pub use db::Database;
pub use inspector::{
    Comparison, DiskUsage, DocumentSummary, EmbeddingsSummary, QuerySummary, RecordInspector,
    DEFAULT_SUMMARY_FILE,
};
pub use memory::MemoryVectorStore;
pub use records::{record_file_name, sanitize_excerpt, RecordWriter};
pub use sqlite::SqliteVectorStore;
pub use store::{cosine_similarity, distance, euclidean_distance, StoreHit, VectorStore};

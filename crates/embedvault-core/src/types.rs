use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EmbedVaultError;

// =============================================================================
// Enums
// =============================================================================

/// Whether an embedding was produced for indexed content or for a search query.
///
/// The kind is the only routing key for on-disk records: it selects the
/// partition directory and the filename prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    Document,
    Query,
}

impl EmbeddingKind {
    /// Name of the partition directory under the embedding root.
    pub fn partition(self) -> &'static str {
        match self {
            EmbeddingKind::Document => "documents",
            EmbeddingKind::Query => "queries",
        }
    }

    /// Filename prefix for records of this kind.
    pub fn file_prefix(self) -> &'static str {
        match self {
            EmbeddingKind::Document => "doc",
            EmbeddingKind::Query => "query",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmbeddingKind::Document => "document",
            EmbeddingKind::Query => "query",
        }
    }
}

impl fmt::Display for EmbeddingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects which record partitions an inspector operation touches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordScope {
    Documents,
    Queries,
    #[default]
    All,
}

impl RecordScope {
    /// The kinds covered by this scope, documents first.
    pub fn kinds(self) -> &'static [EmbeddingKind] {
        match self {
            RecordScope::Documents => &[EmbeddingKind::Document],
            RecordScope::Queries => &[EmbeddingKind::Query],
            RecordScope::All => &[EmbeddingKind::Document, EmbeddingKind::Query],
        }
    }
}

impl FromStr for RecordScope {
    type Err = EmbedVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "documents" | "document" | "docs" => Ok(RecordScope::Documents),
            "queries" | "query" => Ok(RecordScope::Queries),
            "all" => Ok(RecordScope::All),
            other => Err(EmbedVaultError::Config(format!(
                "unknown record scope '{}': expected documents, queries or all",
                other
            ))),
        }
    }
}

// =============================================================================
// Embedding records
// =============================================================================

/// Euclidean norm of a vector, accumulated in f64.
pub fn l2_norm(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|v| (*v as f64) * (*v as f64))
        .sum::<f64>()
        .sqrt()
}

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Provenance block stored with every embedding record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EmbeddingKind,
    pub dimensions: usize,
    pub norm: f64,
    pub model: String,
    pub text_length: usize,
    pub word_count: usize,
}

/// One persisted embedding: the input text, its vector, and provenance.
///
/// Created once when the embedding is generated and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl EmbeddingRecord {
    /// Build a record, deriving norm, dimensions and text statistics.
    pub fn new(
        text: impl Into<String>,
        embedding: Vec<f32>,
        kind: EmbeddingKind,
        model: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let text = text.into();
        let metadata = RecordMetadata {
            timestamp,
            kind,
            dimensions: embedding.len(),
            norm: l2_norm(&embedding),
            model: model.into(),
            text_length: text.chars().count(),
            word_count: word_count(&text),
        };
        Self {
            text,
            embedding,
            metadata,
        }
    }

    pub fn kind(&self) -> EmbeddingKind {
        self.metadata.kind
    }

    /// Whether the stored derived fields agree with the text and vector.
    pub fn derived_fields_consistent(&self) -> bool {
        self.metadata.dimensions == self.embedding.len()
            && self.metadata.text_length == self.text.chars().count()
            && self.metadata.word_count == word_count(&self.text)
            && (self.metadata.norm - l2_norm(&self.embedding)).abs() <= 1e-6
    }
}

// =============================================================================
// Code fragments and indexed entries
// =============================================================================

/// Location metadata attached to a code fragment by the upstream chunker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

/// A piece of source code to embed and index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFragment {
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Free-form tag such as `method` or `class`.
    pub chunk_type: String,
    pub metadata: FragmentMetadata,
}

impl CodeFragment {
    pub fn new(
        content: impl Into<String>,
        start_line: u32,
        end_line: u32,
        chunk_type: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            start_line,
            end_line,
            chunk_type: chunk_type.into(),
            metadata: FragmentMetadata {
                file_path: file_path.into(),
                class_name: None,
                method_name: None,
            },
        }
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.metadata.class_name = Some(class_name.into());
        self
    }

    pub fn with_method_name(mut self, method_name: impl Into<String>) -> Self {
        self.metadata.method_name = Some(method_name.into());
        self
    }

    /// Store identifier for this fragment at `ordinal` (1-based) within one
    /// ingestion call.
    ///
    /// Not unique across calls: the same file, chunk type and ordinal map to
    /// the same id, so re-ingesting replaces the earlier entry.
    pub fn entry_id(&self, ordinal: usize) -> String {
        let file_path = if self.metadata.file_path.is_empty() {
            "unknown"
        } else {
            self.metadata.file_path.as_str()
        };
        format!("{}_{}_{}", file_path, self.chunk_type, ordinal)
    }
}

/// Flat, string-valued metadata stored with each vector store entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub chunk_type: String,
    pub start_line: String,
    pub end_line: String,
    pub file_path: String,
    pub class_name: String,
    pub method_name: String,
}

impl EntryMetadata {
    pub fn from_fragment(fragment: &CodeFragment) -> Self {
        Self {
            chunk_type: fragment.chunk_type.clone(),
            start_line: fragment.start_line.to_string(),
            end_line: fragment.end_line.to_string(),
            file_path: fragment.metadata.file_path.clone(),
            class_name: fragment.metadata.class_name.clone().unwrap_or_default(),
            method_name: fragment.metadata.method_name.clone().unwrap_or_default(),
        }
    }

    /// Flatten into the string map shape the vector store persists.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("chunk_type".to_string(), self.chunk_type.clone()),
            ("start_line".to_string(), self.start_line.clone()),
            ("end_line".to_string(), self.end_line.clone()),
            ("file_path".to_string(), self.file_path.clone()),
            ("class_name".to_string(), self.class_name.clone()),
            ("method_name".to_string(), self.method_name.clone()),
        ])
    }
}

/// An entry submitted to the vector store with a precomputed vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: BTreeMap<String, String>,
}

impl IndexedEntry {
    /// Build the store entry for `fragment` at `ordinal` within its batch call.
    pub fn from_fragment(fragment: &CodeFragment, ordinal: usize, embedding: Vec<f32>) -> Self {
        Self {
            id: fragment.entry_id(ordinal),
            embedding,
            document: fragment.content.clone(),
            metadata: EntryMetadata::from_fragment(fragment).to_map(),
        }
    }
}

/// A ranked search hit returned to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub document: String,
    pub metadata: BTreeMap<String, String>,
    /// Raw distance reported by the vector store.
    pub distance: f64,
    /// `1 - distance`. Only a ranking score when the metric is not bounded.
    pub similarity: f64,
}

impl SearchResult {
    /// Metadata value for `key`, or the empty string.
    pub fn meta(&self, key: &str) -> &str {
        self.metadata.get(key).map(String::as_str).unwrap_or("")
    }
}

// =============================================================================
// Statistics and model info
// =============================================================================

/// Counters of embeddings generated by one generator instance.
#[derive(Debug, Default)]
pub struct RunningStatistics {
    documents_embedded: AtomicU64,
    queries_embedded: AtomicU64,
    total_embeddings_generated: AtomicU64,
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one generated embedding of `kind`.
    pub fn record(&self, kind: EmbeddingKind) {
        self.total_embeddings_generated.fetch_add(1, Ordering::Relaxed);
        match kind {
            EmbeddingKind::Document => self.documents_embedded.fetch_add(1, Ordering::Relaxed),
            EmbeddingKind::Query => self.queries_embedded.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            documents_embedded: self.documents_embedded.load(Ordering::Relaxed),
            queries_embedded: self.queries_embedded.load(Ordering::Relaxed),
            total_embeddings_generated: self.total_embeddings_generated.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.documents_embedded.store(0, Ordering::Relaxed);
        self.queries_embedded.store(0, Ordering::Relaxed);
        self.total_embeddings_generated.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`RunningStatistics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub documents_embedded: u64,
    pub queries_embedded: u64,
    pub total_embeddings_generated: u64,
}

/// Description of the embedding model used to produce vectors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub dimensions: usize,
    pub max_seq_length: usize,
}

//! Read-side access to persisted embedding records.
//!
//! Lists, loads, compares and clears the JSON files produced by
//! [`crate::RecordWriter`], reports disk usage, and exports a
//! summary document of everything on disk.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::{
    EmbeddingKind, EmbeddingRecord, ModelInfo, RecordMetadata, RecordScope, StatsSnapshot,
};

use crate::records::list_record_files;
use crate::store::{cosine_similarity, euclidean_distance};

/// Default file name for [`RecordInspector::export_summary`].
pub const DEFAULT_SUMMARY_FILE: &str = "embeddings_summary.json";

/// Characters of document text kept in the exported summary.
const PREVIEW_CHARS: usize = 100;

/// Similarity between two stored records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub cosine_similarity: f64,
    pub euclidean_distance: f64,
    pub text_a: String,
    pub text_b: String,
}

/// Record counts and bytes on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub documents: usize,
    pub queries: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub text_preview: String,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuerySummary {
    pub filename: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// Contents of the exported summary file.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingsSummary {
    pub statistics: StatsSnapshot,
    pub model_info: ModelInfo,
    pub documents: Vec<DocumentSummary>,
    pub queries: Vec<QuerySummary>,
}

/// Inspector over an embedding directory.
#[derive(Debug, Clone)]
pub struct RecordInspector {
    root: PathBuf,
}

impl RecordInspector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record files in `scope`, sorted by path.
    pub fn list(&self, scope: RecordScope) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for kind in scope.kinds() {
            files.extend(list_record_files(&self.root.join(kind.partition()))?);
        }
        files.sort();
        Ok(files)
    }

    /// Resolve a record identifier to a path.
    ///
    /// Paths that exist are used as given. A bare file name is looked up in
    /// the partition matching its `doc_` or `query_` prefix.
    pub fn resolve(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        if path.exists() || path.components().count() > 1 {
            return path.to_path_buf();
        }
        let kind = if identifier.starts_with(EmbeddingKind::Query.file_prefix()) {
            EmbeddingKind::Query
        } else {
            EmbeddingKind::Document
        };
        self.root.join(kind.partition()).join(identifier)
    }

    /// Load one record.
    pub fn load(&self, identifier: &str) -> Result<EmbeddingRecord> {
        let path = self.resolve(identifier);
        let file = File::open(&path).map_err(|e| {
            EmbedVaultError::Deserialization(format!("Cannot open {}: {}", path.display(), e))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            EmbedVaultError::Deserialization(format!("Malformed record {}: {}", path.display(), e))
        })
    }

    /// Cosine similarity and Euclidean distance between two records.
    pub fn compare(&self, a: &str, b: &str) -> Result<Comparison> {
        let left = self.load(a)?;
        let right = self.load(b)?;
        if left.embedding.len() != right.embedding.len() {
            return Err(EmbedVaultError::DimensionMismatch {
                left: left.embedding.len(),
                right: right.embedding.len(),
            });
        }
        Ok(Comparison {
            cosine_similarity: cosine_similarity(&left.embedding, &right.embedding),
            euclidean_distance: euclidean_distance(&left.embedding, &right.embedding),
            text_a: left.text,
            text_b: right.text,
        })
    }

    /// Delete every record file in `scope` and return how many were removed.
    ///
    /// Not transactional: a failure part-way leaves earlier files deleted.
    pub fn clear(&self, scope: RecordScope) -> Result<usize> {
        let files = self.list(scope)?;
        for path in &files {
            std::fs::remove_file(path)?;
        }
        info!(scope = ?scope, removed = files.len(), "Cleared saved embeddings");
        Ok(files.len())
    }

    /// Count record files per partition and their total size.
    pub fn disk_usage(&self) -> Result<DiskUsage> {
        let documents = self.list(RecordScope::Documents)?;
        let queries = self.list(RecordScope::Queries)?;
        let mut total_bytes = 0;
        for path in documents.iter().chain(queries.iter()) {
            total_bytes += std::fs::metadata(path)?.len();
        }
        Ok(DiskUsage {
            documents: documents.len(),
            queries: queries.len(),
            total_bytes,
        })
    }

    /// Write a summary of all stored records to `<root>/<output_name>`.
    pub fn export_summary(
        &self,
        statistics: StatsSnapshot,
        model_info: ModelInfo,
        output_name: &str,
    ) -> Result<PathBuf> {
        let mut summary = EmbeddingsSummary {
            statistics,
            model_info,
            documents: Vec::new(),
            queries: Vec::new(),
        };

        for path in self.list(RecordScope::Documents)? {
            let record = self.load_path(&path)?;
            summary.documents.push(DocumentSummary {
                filename: file_name(&path),
                text_preview: record.text.chars().take(PREVIEW_CHARS).collect(),
                metadata: record.metadata,
            });
        }
        for path in self.list(RecordScope::Queries)? {
            let record = self.load_path(&path)?;
            summary.queries.push(QuerySummary {
                filename: file_name(&path),
                text: record.text,
                metadata: record.metadata,
            });
        }

        std::fs::create_dir_all(&self.root)?;
        let output = self.root.join(output_name);
        let mut writer = BufWriter::new(File::create(&output)?);
        serde_json::to_writer_pretty(&mut writer, &summary)?;
        writer.flush()?;

        info!(
            path = %output.display(),
            documents = summary.documents.len(),
            queries = summary.queries.len(),
            "Exported embeddings summary"
        );
        Ok(output)
    }

    fn load_path(&self, path: &Path) -> Result<EmbeddingRecord> {
        debug!(path = %path.display(), "Loading record");
        self.load(&path.to_string_lossy())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

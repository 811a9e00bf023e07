//! Embedding generation with statistics and optional record persistence.

use std::sync::Arc;

use tracing::debug;

use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::{
    EmbeddingKind, EmbeddingRecord, ModelInfo, RunningStatistics, StatsSnapshot,
};
use embedvault_storage::RecordWriter;

use crate::embedding::EmbeddingProvider;

/// Wraps a provider, counts what it produces and writes each vector to disk
/// when a [`RecordWriter`] is attached.
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    writer: Option<RecordWriter>,
    stats: RunningStatistics,
}

impl EmbeddingGenerator {
    /// Generator that does not persist records.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            writer: None,
            stats: RunningStatistics::new(),
        }
    }

    /// Persist every generated vector through `writer`.
    pub fn with_writer(mut self, writer: RecordWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn writer(&self) -> Option<&RecordWriter> {
        self.writer.as_ref()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: self.provider.name().to_string(),
            dimensions: self.provider.dimensions(),
            max_seq_length: self.provider.max_seq_length(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Embed `text` as `kind`.
    ///
    /// Counters move only after the provider succeeds. When persistence is
    /// enabled the record is on disk before this returns.
    pub fn generate(&self, text: &str, kind: EmbeddingKind) -> Result<Vec<f32>> {
        let vector = self.provider.embed(text)?;
        if vector.len() != self.provider.dimensions() {
            return Err(EmbedVaultError::Provider(format!(
                "Provider '{}' returned {} dimensions, expected {}",
                self.provider.name(),
                vector.len(),
                self.provider.dimensions()
            )));
        }
        self.stats.record(kind);

        if let Some(writer) = &self.writer {
            let record = EmbeddingRecord::new(
                text,
                vector.clone(),
                kind,
                self.provider.name(),
                writer.next_timestamp()?,
            );
            let path = writer.write(&record)?;
            debug!(path = %path.display(), kind = %kind, "Saved embedding");
        }

        Ok(vector)
    }
}

impl std::fmt::Debug for EmbeddingGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("model", &self.provider.name())
            .field("dimensions", &self.provider.dimensions())
            .field("persist", &self.writer.is_some())
            .finish()
    }
}

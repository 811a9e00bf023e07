//! Ingestion pipeline.
//!
//! Embeds code fragments as documents and submits them to the vector store
//! in fixed-size batches. All fragments are embedded before the first batch
//! is submitted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::{CodeFragment, EmbeddingKind, IndexedEntry};
use embedvault_storage::VectorStore;

use crate::generator::EmbeddingGenerator;

/// Outcome of one [`IngestionPipeline::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Fragments embedded and submitted.
    pub fragments: usize,
    /// Number of `add` calls made on the store.
    pub batches: usize,
    /// Entries in the collection after ingestion.
    pub collection_count: usize,
}

/// Embeds fragments and stores them in batches.
pub struct IngestionPipeline {
    generator: Arc<EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
    pub fn new(generator: Arc<EmbeddingGenerator>, store: Arc<dyn VectorStore>) -> Self {
        Self { generator, store }
    }

    /// Embed `fragments` in order and add them to the store in chunks of at
    /// most `batch_size`.
    ///
    /// Entry ids are `{file_path}_{chunk_type}_{ordinal}` with a 1-based
    /// ordinal local to this call. A failed `add` is returned as-is; batches
    /// submitted before it stay in the store.
    pub fn ingest(&self, fragments: &[CodeFragment], batch_size: usize) -> Result<IngestReport> {
        if batch_size == 0 {
            return Err(EmbedVaultError::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if fragments.is_empty() {
            info!("No fragments to ingest");
            return Ok(IngestReport::default());
        }

        info!(
            fragments = fragments.len(),
            collection = self.store.name(),
            "Generating document embeddings"
        );

        let mut entries = Vec::with_capacity(fragments.len());
        for (i, fragment) in fragments.iter().enumerate() {
            let embedding = self
                .generator
                .generate(&fragment.content, EmbeddingKind::Document)?;
            entries.push(IndexedEntry::from_fragment(fragment, i + 1, embedding));
        }

        let mut batches = 0;
        for chunk in entries.chunks(batch_size) {
            self.store.add(chunk)?;
            batches += 1;
            debug!(
                batch = batches,
                size = chunk.len(),
                collection = self.store.name(),
                "Added batch"
            );
        }

        let collection_count = self.store.count()?;
        info!(
            fragments = entries.len(),
            batches,
            collection_count,
            "Ingestion complete"
        );

        Ok(IngestReport {
            fragments: entries.len(),
            batches,
            collection_count,
        })
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedding;
    use embedvault_core::config::DistanceMetric;
    use embedvault_storage::{MemoryVectorStore, StoreHit};
    use std::sync::Mutex;

    /// Records the size of every `add` and optionally fails one of them.
    struct RecordingStore {
        inner: MemoryVectorStore,
        add_sizes: Mutex<Vec<usize>>,
        fail_on_call: Option<usize>,
    }

    impl RecordingStore {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                inner: MemoryVectorStore::new("recording", DistanceMetric::Cosine),
                add_sizes: Mutex::new(Vec::new()),
                fail_on_call,
            }
        }

        fn sizes(&self) -> Vec<usize> {
            self.add_sizes.lock().unwrap().clone()
        }
    }

    impl VectorStore for RecordingStore {
        fn name(&self) -> &str {
            self.inner.name()
        }
        fn metric(&self) -> DistanceMetric {
            self.inner.metric()
        }
        fn add(&self, entries: &[IndexedEntry]) -> Result<()> {
            let mut sizes = self.add_sizes.lock().unwrap();
            if self.fail_on_call == Some(sizes.len() + 1) {
                return Err(EmbedVaultError::Storage("store unavailable".to_string()));
            }
            sizes.push(entries.len());
            self.inner.add(entries)
        }
        fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<StoreHit>> {
            self.inner.query(embedding, k)
        }
        fn count(&self) -> Result<usize> {
            self.inner.count()
        }
        fn delete(&self) -> Result<()> {
            self.inner.delete()
        }
        fn get_all(&self) -> Result<Vec<IndexedEntry>> {
            self.inner.get_all()
        }
    }

    fn fragments(n: usize) -> Vec<CodeFragment> {
        (0..n)
            .map(|i| {
                CodeFragment::new(
                    format!("void m{}() {{}}", i),
                    i as u32 * 10 + 1,
                    i as u32 * 10 + 3,
                    "method",
                    "A.java",
                )
            })
            .collect()
    }

    fn pipeline(store: Arc<RecordingStore>) -> (Arc<EmbeddingGenerator>, IngestionPipeline) {
        let generator = Arc::new(EmbeddingGenerator::new(Arc::new(MockEmbedding::new(16))));
        let pipeline = IngestionPipeline::new(Arc::clone(&generator), store);
        (generator, pipeline)
    }

    #[test]
    fn test_batches_are_contiguous_and_bounded() {
        for (n, batch, expected) in [
            (5, 2, vec![2, 2, 1]),
            (4, 2, vec![2, 2]),
            (3, 10, vec![3]),
            (1, 1, vec![1]),
        ] {
            let store = Arc::new(RecordingStore::new(None));
            let (_, pipeline) = pipeline(Arc::clone(&store));
            let report = pipeline.ingest(&fragments(n), batch).unwrap();

            assert_eq!(store.sizes(), expected, "n={} batch={}", n, batch);
            assert_eq!(report.batches, n.div_ceil(batch));
            assert_eq!(report.fragments, n);
            assert_eq!(report.collection_count, n);
        }
    }

    #[test]
    fn test_ids_and_metadata() {
        let store = Arc::new(RecordingStore::new(None));
        let (_, pipeline) = pipeline(Arc::clone(&store));
        let input = vec![
            CodeFragment::new("class A {}", 1, 9, "class", "A.java").with_class_name("A"),
            CodeFragment::new("void run() {}", 2, 4, "method", "")
                .with_class_name("A")
                .with_method_name("run"),
        ];
        pipeline.ingest(&input, 10).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all[0].id, "A.java_class_1");
        assert_eq!(all[1].id, "unknown_method_2");
        assert_eq!(all[0].document, "class A {}");
        assert_eq!(all[0].metadata["start_line"], "1");
        assert_eq!(all[0].metadata["end_line"], "9");
        assert_eq!(all[0].metadata["method_name"], "");
        assert_eq!(all[1].metadata["method_name"], "run");
        assert_eq!(all[1].metadata["file_path"], "");
    }

    #[test]
    fn test_empty_input_is_noop() {
        let store = Arc::new(RecordingStore::new(None));
        let (generator, pipeline) = pipeline(Arc::clone(&store));
        let report = pipeline.ingest(&[], 5).unwrap();
        assert_eq!(report, IngestReport::default());
        assert!(store.sizes().is_empty());
        assert_eq!(generator.stats().total_embeddings_generated, 0);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let store = Arc::new(RecordingStore::new(None));
        let (_, pipeline) = pipeline(Arc::clone(&store));
        assert!(matches!(
            pipeline.ingest(&fragments(2), 0),
            Err(EmbedVaultError::Config(_))
        ));
    }

    #[test]
    fn test_failed_batch_keeps_earlier_batches() {
        let store = Arc::new(RecordingStore::new(Some(2)));
        let (generator, pipeline) = pipeline(Arc::clone(&store));
        let result = pipeline.ingest(&fragments(5), 2);

        assert!(matches!(result, Err(EmbedVaultError::Storage(_))));
        assert_eq!(store.count().unwrap(), 2);
        // Every fragment was embedded before submission started.
        assert_eq!(generator.stats().documents_embedded, 5);
    }

    #[test]
    fn test_reingest_replaces_entries() {
        let store = Arc::new(RecordingStore::new(None));
        let (_, pipeline) = pipeline(Arc::clone(&store));
        pipeline.ingest(&fragments(3), 2).unwrap();
        let report = pipeline.ingest(&fragments(3), 2).unwrap();
        assert_eq!(report.collection_count, 3);
    }
}

//! End-to-end tests over the manager, pipelines, stores and record files.
//!
//! Every test builds its own temporary embedding directory and uses the
//! mock provider, so no model files are needed.

use std::sync::{Arc, Mutex};

use embedvault_core::config::{DistanceMetric, EmbeddingsConfig};
use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::{CodeFragment, EmbeddingKind, IndexedEntry, RecordScope};
use embedvault_storage::{
    Database, MemoryVectorStore, RecordWriter, SqliteVectorStore, StoreHit, VectorStore,
};
use embedvault_vector::{EmbeddingGenerator, EmbeddingManager, EmbeddingProvider, MockEmbedding};

// =============================================================================
// Helpers
// =============================================================================

/// Store wrapper that remembers the size of every `add` call.
struct CountingStore {
    inner: Arc<dyn VectorStore>,
    adds: Mutex<Vec<usize>>,
}

impl CountingStore {
    fn new(inner: Arc<dyn VectorStore>) -> Self {
        Self {
            inner,
            adds: Mutex::new(Vec::new()),
        }
    }

    fn add_sizes(&self) -> Vec<usize> {
        self.adds.lock().unwrap().clone()
    }
}

impl VectorStore for CountingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn metric(&self) -> DistanceMetric {
        self.inner.metric()
    }
    fn add(&self, entries: &[IndexedEntry]) -> Result<()> {
        self.adds.lock().unwrap().push(entries.len());
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

fn embeddings_config(dir: &std::path::Path) -> EmbeddingsConfig {
    EmbeddingsConfig {
        directory: dir.to_path_buf(),
        ..Default::default()
    }
}

fn manager_with(
    dir: &std::path::Path,
    inner: Arc<dyn VectorStore>,
) -> (EmbeddingManager, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new(inner));
    let manager = EmbeddingManager::new(
        Arc::new(MockEmbedding::new(64)),
        store.clone(),
        &embeddings_config(dir),
    )
    .unwrap();
    (manager, store)
}

fn memory_manager(dir: &std::path::Path) -> (EmbeddingManager, Arc<CountingStore>) {
    manager_with(
        dir,
        Arc::new(MemoryVectorStore::new("java_code", DistanceMetric::Cosine)),
    )
}

fn java_fragments() -> Vec<CodeFragment> {
    vec![
        CodeFragment::new("int add(a,b){return a+b;}", 1, 1, "method", "A.java"),
        CodeFragment::new("int sub(a,b){return a-b;}", 2, 2, "method", "A.java"),
        CodeFragment::new("int mul(a,b){return a*b;}", 3, 3, "method", "A.java"),
    ]
}

// =============================================================================
// Example scenario
// =============================================================================

#[test]
fn test_ingest_then_search_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = memory_manager(dir.path());

    let report = manager.ingest(&java_fragments(), 2).unwrap();
    assert_eq!(store.add_sizes(), vec![2, 1]);
    assert_eq!(report.batches, 2);
    assert_eq!(report.collection_count, 3);

    let ids: Vec<_> = manager.get_all().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(
        ids,
        vec!["A.java_method_1", "A.java_method_2", "A.java_method_3"]
    );

    let results = manager.search("add two numbers", 2).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].similarity >= results[1].similarity);
    for r in &results {
        assert!((r.similarity - (1.0 - r.distance)).abs() < 1e-12);
        assert_eq!(r.meta("file_path"), "A.java");
        assert_eq!(r.meta("chunk_type"), "method");
    }

    let stats = manager.stats();
    assert_eq!(stats.documents_embedded, 3);
    assert_eq!(stats.queries_embedded, 1);
    assert_eq!(stats.total_embeddings_generated, 4);

    assert_eq!(manager.list(RecordScope::Documents).unwrap().len(), 3);
    assert_eq!(manager.list(RecordScope::Queries).unwrap().len(), 1);
}

#[test]
fn test_search_results_follow_store_order() {
    let dir = tempfile::tempdir().unwrap();
    let inner: Arc<dyn VectorStore> =
        Arc::new(MemoryVectorStore::new("java_code", DistanceMetric::L2));
    let (manager, store) = manager_with(dir.path(), Arc::clone(&inner));
    manager.ingest(&java_fragments(), 10).unwrap();

    let results = manager.search("int mul(a,b){return a*b;}", 3).unwrap();
    let query = MockEmbedding::new(64)
        .embed("int mul(a,b){return a*b;}")
        .unwrap();
    let hits = store.query(&query, 3).unwrap();

    let result_ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    let hit_ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(result_ids, hit_ids);
    assert_eq!(results[0].id, "A.java_method_3");
    assert!(results[0].distance.abs() < 1e-9);
}

// =============================================================================
// Batching
// =============================================================================

#[test]
fn test_batch_count_is_ceiling() {
    for (n, b) in [(7usize, 3usize), (6, 3), (1, 5), (10, 1)] {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = memory_manager(dir.path());
        let fragments: Vec<_> = (0..n)
            .map(|i| CodeFragment::new(format!("void f{}() {{}}", i), 1, 1, "method", "B.java"))
            .collect();

        manager.ingest(&fragments, b).unwrap();
        let sizes = store.add_sizes();
        assert_eq!(sizes.len(), n.div_ceil(b));
        let last = if n % b == 0 { b } else { n % b };
        assert_eq!(*sizes.last().unwrap(), last);
        assert!(sizes[..sizes.len() - 1].iter().all(|s| *s == b));
    }
}

#[test]
fn test_dimension_change_rejected_by_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn VectorStore> =
        Arc::new(MemoryVectorStore::new("java_code", DistanceMetric::Cosine));
    let (first, _) = manager_with(dir.path(), Arc::clone(&store));
    first.ingest(&java_fragments(), 10).unwrap();

    let other = EmbeddingManager::new(
        Arc::new(MockEmbedding::new(32)),
        Arc::clone(&store),
        &embeddings_config(dir.path()),
    )
    .unwrap();
    let result = other.ingest(&java_fragments()[..1], 10);
    assert!(matches!(result, Err(EmbedVaultError::Storage(_))));
    assert_eq!(store.count().unwrap(), 3);
}

// =============================================================================
// Records on disk
// =============================================================================

#[test]
fn test_record_round_trip_through_generator() {
    let dir = tempfile::tempdir().unwrap();
    let generator = EmbeddingGenerator::new(Arc::new(MockEmbedding::new(48)))
        .with_writer(RecordWriter::new(dir.path()).unwrap());
    let text = "/* héllo */ public void greet() { System.out.println(\"hi\"); }";
    let vector = generator.generate(text, EmbeddingKind::Document).unwrap();

    let inspector = embedvault_storage::RecordInspector::new(dir.path());
    let files = inspector.list(RecordScope::Documents).unwrap();
    assert_eq!(files.len(), 1);

    let record = inspector.load(files[0].to_str().unwrap()).unwrap();
    assert_eq!(record.text, text);
    assert_eq!(record.embedding.len(), vector.len());
    for (a, b) in record.embedding.iter().zip(vector.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
    assert!(record.derived_fields_consistent());
    assert_eq!(record.metadata.kind, EmbeddingKind::Document);
}

#[test]
fn test_list_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = memory_manager(dir.path());
    manager.ingest(&java_fragments(), 2).unwrap();
    manager.search("q", 1).unwrap();

    for scope in [RecordScope::Documents, RecordScope::Queries, RecordScope::All] {
        assert_eq!(manager.list(scope).unwrap(), manager.list(scope).unwrap());
    }
}

#[test]
fn test_clear_documents_leaves_queries() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = memory_manager(dir.path());
    manager.ingest(&java_fragments(), 2).unwrap();
    manager.search("add", 1).unwrap();
    manager.search("sub", 1).unwrap();

    assert_eq!(manager.clear(RecordScope::Documents).unwrap(), 3);
    assert!(manager.list(RecordScope::Documents).unwrap().is_empty());
    assert_eq!(manager.list(RecordScope::Queries).unwrap().len(), 2);
    // The store is untouched by clearing record files.
    assert_eq!(manager.count().unwrap(), 3);
}

#[test]
fn test_compare_mismatched_records() {
    let dir = tempfile::tempdir().unwrap();
    let small = EmbeddingGenerator::new(Arc::new(MockEmbedding::new(8)))
        .with_writer(RecordWriter::new(dir.path()).unwrap());
    let large = EmbeddingGenerator::new(Arc::new(MockEmbedding::new(16)))
        .with_writer(RecordWriter::new(dir.path()).unwrap());
    small.generate("short", EmbeddingKind::Document).unwrap();
    large.generate("long", EmbeddingKind::Query).unwrap();

    let (manager, _) = memory_manager(dir.path());
    let doc = manager.list(RecordScope::Documents).unwrap().remove(0);
    let query = manager.list(RecordScope::Queries).unwrap().remove(0);

    let err = manager
        .compare(doc.to_str().unwrap(), query.to_str().unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        EmbedVaultError::DimensionMismatch { left: 8, right: 16 }
    ));
}

#[test]
fn test_export_summary_lists_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = memory_manager(dir.path());
    manager.ingest(&java_fragments(), 2).unwrap();
    manager.search("add two numbers", 1).unwrap();

    let path = manager
        .export_summary(embedvault_storage::DEFAULT_SUMMARY_FILE)
        .unwrap();
    let summary: embedvault_storage::EmbeddingsSummary =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    assert_eq!(summary.documents.len(), 3);
    assert_eq!(summary.queries.len(), 1);
    assert_eq!(summary.queries[0].text, "add two numbers");
    assert_eq!(summary.statistics.total_embeddings_generated, 4);
    assert_eq!(summary.model_info.dimensions, 64);
}

// =============================================================================
// Persistent store
// =============================================================================

#[test]
fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_dir = dir.path().join("vector_db");

    {
        let db = Arc::new(Database::open_dir(&db_dir).unwrap());
        let store = Arc::new(
            SqliteVectorStore::open(db, "java_code", DistanceMetric::Cosine, "test").unwrap(),
        );
        let (manager, _) = manager_with(&dir.path().join("embeddings"), store);
        manager.ingest(&java_fragments(), 2).unwrap();
    }

    let db = Arc::new(Database::open_dir(&db_dir).unwrap());
    let store = Arc::new(
        SqliteVectorStore::open(db, "java_code", DistanceMetric::Cosine, "test").unwrap(),
    );
    let (manager, _) = manager_with(&dir.path().join("embeddings"), store);
    assert_eq!(manager.count().unwrap(), 3);

    let results = manager.search("int add(a,b){return a+b;}", 1).unwrap();
    assert_eq!(results[0].id, "A.java_method_1");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

//! `EmbeddingManager` - one handle over generation, storage and inspection.
//!
//! Wires a provider, a vector store, the record writer and the inspector
//! together from an [`EmbedVaultConfig`], and exposes every operation the
//! command line needs.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use embedvault_core::config::{EmbedVaultConfig, EmbeddingsConfig, ProviderKind, StoreBackend};
use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::{
    CodeFragment, EmbeddingRecord, IndexedEntry, ModelInfo, RecordScope, SearchResult,
    StatsSnapshot,
};
use embedvault_storage::{
    Comparison, Database, DiskUsage, MemoryVectorStore, RecordInspector, RecordWriter,
    SqliteVectorStore, VectorStore,
};

use crate::embedding::{EmbeddingProvider, MockEmbedding, OnnxEmbeddingProvider};
use crate::generator::EmbeddingGenerator;
use crate::pipeline::{IngestReport, IngestionPipeline};
use crate::search::SearchPipeline;

const COLLECTION_DESCRIPTION: &str = "Java code chunks for semantic search";

/// Facade over the embedding and storage components.
pub struct EmbeddingManager {
    generator: Arc<EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
    ingestion: IngestionPipeline,
    search: SearchPipeline,
    inspector: RecordInspector,
}

impl EmbeddingManager {
    /// Assemble a manager from explicit components.
    ///
    /// Records are written under `embeddings.directory` when
    /// `embeddings.save_embeddings` is set.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        embeddings: &EmbeddingsConfig,
    ) -> Result<Self> {
        let mut generator = EmbeddingGenerator::new(provider);
        if embeddings.save_embeddings {
            let writer = RecordWriter::new(&embeddings.directory)?
                .with_retention(embeddings.max_records_per_kind);
            generator = generator.with_writer(writer);
        }
        let generator = Arc::new(generator);

        info!(
            model = %generator.model_info().name,
            dimensions = generator.dimensions(),
            collection = store.name(),
            embedding_dir = %embeddings.directory.display(),
            save_embeddings = embeddings.save_embeddings,
            "Embedding manager ready"
        );

        Ok(Self {
            ingestion: IngestionPipeline::new(Arc::clone(&generator), Arc::clone(&store)),
            search: SearchPipeline::new(Arc::clone(&generator), Arc::clone(&store)),
            inspector: RecordInspector::new(&embeddings.directory),
            generator,
            store,
        })
    }

    /// Build the provider and store named by `config`.
    pub fn from_config(config: &EmbedVaultConfig) -> Result<Self> {
        config.validate()?;
        let provider = build_provider(config)?;
        let store = build_store(config)?;
        Self::new(provider, store, &config.embeddings)
    }

    pub fn ingest(&self, fragments: &[CodeFragment], batch_size: usize) -> Result<IngestReport> {
        let report = self.ingestion.ingest(fragments, batch_size)?;
        self.log_statistics()?;
        Ok(report)
    }

    pub fn search(&self, query: &str, n_results: usize) -> Result<Vec<SearchResult>> {
        let results = self.search.search(query, n_results)?;
        self.log_statistics()?;
        Ok(results)
    }

    pub fn list(&self, scope: RecordScope) -> Result<Vec<PathBuf>> {
        self.inspector.list(scope)
    }

    pub fn load(&self, identifier: &str) -> Result<EmbeddingRecord> {
        self.inspector.load(identifier)
    }

    pub fn compare(&self, a: &str, b: &str) -> Result<Comparison> {
        self.inspector.compare(a, b)
    }

    pub fn clear(&self, scope: RecordScope) -> Result<usize> {
        self.inspector.clear(scope)
    }

    pub fn disk_usage(&self) -> Result<DiskUsage> {
        self.inspector.disk_usage()
    }

    /// Write `<embedding_dir>/<output_name>` summarising every stored record.
    pub fn export_summary(&self, output_name: &str) -> Result<PathBuf> {
        self.inspector
            .export_summary(self.stats(), self.model_info(), output_name)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.generator.stats()
    }

    pub fn reset_stats(&self) {
        self.generator.reset_stats();
    }

    pub fn model_info(&self) -> ModelInfo {
        self.generator.model_info()
    }

    /// Entries in the vector store collection.
    pub fn count(&self) -> Result<usize> {
        self.store.count()
    }

    pub fn get_all(&self) -> Result<Vec<IndexedEntry>> {
        self.store.get_all()
    }

    /// Drop the vector store collection. Record files are kept.
    pub fn drop_collection(&self) -> Result<()> {
        self.store.delete()?;
        info!(collection = self.store.name(), "Deleted collection");
        Ok(())
    }

    pub fn generator(&self) -> &Arc<EmbeddingGenerator> {
        &self.generator
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn inspector(&self) -> &RecordInspector {
        &self.inspector
    }

    /// Log generation counters and, when records are saved, their disk usage.
    pub fn log_statistics(&self) -> Result<()> {
        let stats = self.stats();
        info!(
            total = stats.total_embeddings_generated,
            documents = stats.documents_embedded,
            queries = stats.queries_embedded,
            "Embedding statistics"
        );
        if self.generator.writer().is_some() {
            let usage = self.disk_usage()?;
            info!(
                document_files = usage.documents,
                query_files = usage.queries,
                kib = format!("{:.2}", usage.total_bytes as f64 / 1024.0),
                "Saved embeddings on disk"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for EmbeddingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingManager")
            .field("generator", &self.generator)
            .field("collection", &self.store.name())
            .field("embedding_dir", &self.inspector.root())
            .finish()
    }
}

fn build_provider(config: &EmbedVaultConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let model = &config.model;
    match model.provider {
        ProviderKind::Mock => Ok(Arc::new(
            MockEmbedding::new(model.dimensions).with_name(&model.name),
        )),
        ProviderKind::Onnx => {
            let dir = model.model_dir.as_ref().ok_or_else(|| {
                EmbedVaultError::Config(
                    "model.model_dir is required for the onnx provider".to_string(),
                )
            })?;
            let provider =
                OnnxEmbeddingProvider::from_directory(dir, &model.name, model.max_seq_length)?;
            if provider.dimensions() != model.dimensions {
                return Err(EmbedVaultError::Config(format!(
                    "Model at {} produces {} dimensions but model.dimensions is {}",
                    dir.display(),
                    provider.dimensions(),
                    model.dimensions
                )));
            }
            Ok(Arc::new(provider))
        }
    }
}

fn build_store(config: &EmbedVaultConfig) -> Result<Arc<dyn VectorStore>> {
    let store = &config.store;
    match store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryVectorStore::new(
            &store.collection_name,
            store.distance,
        ))),
        StoreBackend::Sqlite => {
            let db = Arc::new(Database::open_dir(&store.persist_directory)?);
            Ok(Arc::new(SqliteVectorStore::open(
                db,
                &store.collection_name,
                store.distance,
                COLLECTION_DESCRIPTION,
            )?))
        }
    }
}

//! Search pipeline: embed a query and ask the vector store for neighbours.

use std::sync::Arc;

use tracing::{debug, info};

use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::{EmbeddingKind, SearchResult};
use embedvault_storage::VectorStore;

use crate::generator::EmbeddingGenerator;

/// Runs similarity queries against a shared store.
///
/// Uses the same [`EmbeddingGenerator`] as ingestion, so queries are
/// counted and persisted like documents.
pub struct SearchPipeline {
    generator: Arc<EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
}

impl SearchPipeline {
    pub fn new(generator: Arc<EmbeddingGenerator>, store: Arc<dyn VectorStore>) -> Self {
        Self { generator, store }
    }

    /// Return up to `n_results` entries closest to `query`, in the order the
    /// store ranked them. `similarity` is `1 - distance`.
    pub fn search(&self, query: &str, n_results: usize) -> Result<Vec<SearchResult>> {
        if n_results == 0 {
            return Err(EmbedVaultError::Config(
                "n_results must be greater than zero".to_string(),
            ));
        }

        let vector = self.generator.generate(query, EmbeddingKind::Query)?;
        let hits = self.store.query(&vector, n_results)?;
        debug!(hits = hits.len(), collection = self.store.name(), "Store query returned");

        let results: Vec<SearchResult> = hits
            .into_iter()
            .map(|hit| SearchResult {
                similarity: 1.0 - hit.distance,
                id: hit.id,
                document: hit.document,
                metadata: hit.metadata,
                distance: hit.distance,
            })
            .collect();

        info!(query_len = query.len(), results = results.len(), "Search complete");
        Ok(results)
    }
}

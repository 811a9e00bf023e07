//! In-memory vector store with brute-force search.
//!
//! All operations are O(n) for search, which is acceptable for moderate
//! collection sizes and for tests. Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::RwLock;

use embedvault_core::config::DistanceMetric;
use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::IndexedEntry;

use crate::store::{check_batch_dimensions, check_query_dimensions, rank, StoreHit, VectorStore};

#[derive(Debug, Default)]
struct Collection {
    entries: Vec<IndexedEntry>,
    positions: HashMap<String, usize>,
    dimensions: Option<usize>,
}

/// Process-local collection guarded by an RwLock.
#[derive(Debug)]
pub struct MemoryVectorStore {
    name: String,
    metric: DistanceMetric,
    collection: RwLock<Collection>,
}

impl MemoryVectorStore {
    /// Create a new empty collection.
    pub fn new(name: impl Into<String>, metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            metric,
            collection: RwLock::new(Collection::default()),
        }
    }

    /// Vector dimension of the collection, once the first entry is stored.
    pub fn dimensions(&self) -> Option<usize> {
        self.collection.read().ok().and_then(|c| c.dimensions)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> EmbedVaultError {
    EmbedVaultError::Storage(format!("Lock poisoned: {}", e))
}

impl VectorStore for MemoryVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn add(&self, entries: &[IndexedEntry]) -> Result<()> {
        let mut collection = self.collection.write().map_err(poisoned)?;
        let dimensions = check_batch_dimensions(entries, collection.dimensions)?;
        collection.dimensions = dimensions;

        for entry in entries {
            match collection.positions.get(&entry.id).copied() {
                Some(pos) => collection.entries[pos] = entry.clone(),
                None => {
                    let pos = collection.entries.len();
                    collection.positions.insert(entry.id.clone(), pos);
                    collection.entries.push(entry.clone());
                }
            }
        }
        Ok(())
    }

    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<StoreHit>> {
        let collection = self.collection.read().map_err(poisoned)?;
        check_query_dimensions(embedding, collection.dimensions)?;
        Ok(rank(self.metric, embedding, &collection.entries, k))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.collection.read().map_err(poisoned)?.entries.len())
    }

    fn delete(&self) -> Result<()> {
        *self.collection.write().map_err(poisoned)? = Collection::default();
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<IndexedEntry>> {
        Ok(self.collection.read().map_err(poisoned)?.entries.clone())
    }
}

//! Vector store abstraction and distance functions.
//!
//! A [`VectorStore`] holds one named collection of entries with precomputed
//! vectors and answers nearest-neighbour queries over them. Two backends
//! ship with the crate: [`crate::MemoryVectorStore`] and
//! [`crate::SqliteVectorStore`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use embedvault_core::config::DistanceMetric;
use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::IndexedEntry;

/// One neighbour returned by [`VectorStore::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHit {
    pub id: String,
    pub document: String,
    pub metadata: BTreeMap<String, String>,
    /// Distance under the collection's metric; smaller is closer.
    pub distance: f64,
}

/// A collection of vectors supporting insertion and similarity queries.
///
/// Every method blocks until the backend has finished. All vectors in a
/// collection share one dimension, fixed by the first successful `add`.
pub trait VectorStore: Send + Sync {
    /// Name of the collection this handle addresses.
    fn name(&self) -> &str;

    /// Distance metric used by [`VectorStore::query`].
    fn metric(&self) -> DistanceMetric;

    /// Insert entries with precomputed vectors, replacing entries whose id
    /// already exists. The batch is applied atomically.
    fn add(&self, entries: &[IndexedEntry]) -> Result<()>;

    /// Return up to `k` entries ordered by ascending distance to `embedding`.
    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<StoreHit>>;

    /// Number of entries in the collection.
    fn count(&self) -> Result<usize>;

    /// Drop the whole collection. The handle stays usable and starts empty.
    fn delete(&self) -> Result<()>;

    /// Every stored entry in insertion order.
    fn get_all(&self) -> Result<Vec<IndexedEntry>>;
}

/// Check that every entry in `entries` has the same dimension as `expected`
/// (or as the first entry when the collection is still empty).
///
/// Returns the batch dimension, or `None` for an empty batch.
pub(crate) fn check_batch_dimensions(
    entries: &[IndexedEntry],
    expected: Option<usize>,
) -> Result<Option<usize>> {
    let Some(first) = entries.first() else {
        return Ok(expected);
    };
    let dimensions = expected.unwrap_or(first.embedding.len());
    if dimensions == 0 {
        return Err(EmbedVaultError::Storage(
            "Cannot store an empty vector".to_string(),
        ));
    }
    for entry in entries {
        if entry.embedding.len() != dimensions {
            return Err(EmbedVaultError::Storage(format!(
                "Entry '{}' has dimension {} but the collection expects {}",
                entry.id,
                entry.embedding.len(),
                dimensions
            )));
        }
    }
    Ok(Some(dimensions))
}

/// Check a query vector against the collection dimension.
pub(crate) fn check_query_dimensions(query: &[f32], expected: Option<usize>) -> Result<()> {
    match expected {
        Some(dimensions) if dimensions != query.len() => Err(EmbedVaultError::Storage(format!(
            "Query has dimension {} but the collection expects {}",
            query.len(),
            dimensions
        ))),
        _ => Ok(()),
    }
}

/// Distance between two equal-length vectors under `metric`.
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f64 {
    match metric {
        DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
        DistanceMetric::L2 => squared_euclidean(a, b),
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Sum of squared component differences.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum()
}

/// Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Rank `candidates` by ascending distance and keep the first `k`.
///
/// The sort is stable, so equal distances keep insertion order.
pub(crate) fn rank<'a, I>(
    metric: DistanceMetric,
    query: &[f32],
    candidates: I,
    k: usize,
) -> Vec<StoreHit>
where
    I: IntoIterator<Item = &'a IndexedEntry>,
{
    let mut hits: Vec<StoreHit> = candidates
        .into_iter()
        .map(|entry| StoreHit {
            id: entry.id.clone(),
            document: entry.document.clone(),
            metadata: entry.metadata.clone(),
            distance: distance(metric, query, &entry.embedding),
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

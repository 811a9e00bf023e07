//! SQLite-backed persistent vector store.
//!
//! Each handle addresses one named collection inside a [`Database`]. Vectors
//! are stored as little-endian f32 blobs and searched by a full scan.

use std::collections::BTreeMap;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use embedvault_core::config::DistanceMetric;
use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::IndexedEntry;

use crate::db::Database;
use crate::store::{check_batch_dimensions, check_query_dimensions, rank, StoreHit, VectorStore};

/// Persistent collection of vectors in SQLite.
pub struct SqliteVectorStore {
    db: Arc<Database>,
    name: String,
    description: String,
    metric: DistanceMetric,
}

impl SqliteVectorStore {
    /// Get or create the collection `name`.
    ///
    /// An existing collection keeps the metric it was created with; asking
    /// for a different one is an error.
    pub fn open(
        db: Arc<Database>,
        name: impl Into<String>,
        metric: DistanceMetric,
        description: impl Into<String>,
    ) -> Result<Self> {
        let store = Self {
            db,
            name: name.into(),
            description: description.into(),
            metric,
        };

        let existing = store
            .db
            .with_conn(|conn| collection_row(conn, &store.name))?;
        match existing {
            Some((stored_metric, _)) if stored_metric != store.metric => {
                return Err(EmbedVaultError::Storage(format!(
                    "Collection '{}' uses the {} metric, not {}",
                    store.name,
                    metric_name(stored_metric),
                    metric_name(store.metric)
                )));
            }
            Some(_) => {}
            None => store.db.with_conn(|conn| store.ensure_collection(conn))?,
        }

        info!(
            collection = %store.name,
            metric = metric_name(store.metric),
            "Vector collection ready"
        );
        Ok(store)
    }

    /// Vector dimension of the collection, once the first entry is stored.
    pub fn dimensions(&self) -> Result<Option<usize>> {
        self.db.with_conn(|conn| {
            Ok(collection_row(conn, &self.name)?.and_then(|(_, dimensions)| dimensions))
        })
    }

    fn ensure_collection(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, description, distance) VALUES (?1, ?2, ?3)",
            rusqlite::params![self.name, self.description, metric_name(self.metric)],
        )
        .map_err(|e| EmbedVaultError::Storage(format!("Failed to create collection: {}", e)))?;
        Ok(())
    }

    fn load_entries(&self, conn: &Connection) -> Result<Vec<IndexedEntry>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, embedding, document, metadata FROM entries
                 WHERE collection = ?1
                 ORDER BY rowid ASC",
            )
            .map_err(|e| EmbedVaultError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params![self.name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| EmbedVaultError::Storage(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, blob, document, metadata) =
                row.map_err(|e| EmbedVaultError::Storage(e.to_string()))?;
            let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)
                .map_err(|e| {
                    EmbedVaultError::Storage(format!("Corrupt metadata for '{}': {}", id, e))
                })?;
            entries.push(IndexedEntry {
                embedding: decode_vector(&blob)?,
                id,
                document,
                metadata,
            });
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for SqliteVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVectorStore")
            .field("name", &self.name)
            .field("metric", &self.metric)
            .finish()
    }
}

impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn add(&self, entries: &[IndexedEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| EmbedVaultError::Storage(e.to_string()))?;

            self.ensure_collection(&tx)?;
            let current = collection_row(&tx, &self.name)?.and_then(|(_, d)| d);
            let dimensions = check_batch_dimensions(entries, current)?;

            if current.is_none() {
                tx.execute(
                    "UPDATE collections SET dimensions = ?1 WHERE name = ?2",
                    rusqlite::params![dimensions.map(|d| d as i64), self.name],
                )
                .map_err(|e| EmbedVaultError::Storage(e.to_string()))?;
            }

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO entries (collection, id, embedding, document, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT (collection, id) DO UPDATE SET
                            embedding = excluded.embedding,
                            document = excluded.document,
                            metadata = excluded.metadata",
                    )
                    .map_err(|e| EmbedVaultError::Storage(e.to_string()))?;

                for entry in entries {
                    let metadata = serde_json::to_string(&entry.metadata)?;
                    stmt.execute(rusqlite::params![
                        self.name,
                        entry.id,
                        encode_vector(&entry.embedding),
                        entry.document,
                        metadata,
                    ])
                    .map_err(|e| {
                        EmbedVaultError::Storage(format!(
                            "Failed to add entry '{}': {}",
                            entry.id, e
                        ))
                    })?;
                }
            }

            tx.commit()
                .map_err(|e| EmbedVaultError::Storage(format!("Failed to commit batch: {}", e)))?;
            debug!(collection = %self.name, count = entries.len(), "Batch committed");
            Ok(())
        })
    }

    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<StoreHit>> {
        self.db.with_conn(|conn| {
            let dimensions = collection_row(conn, &self.name)?.and_then(|(_, d)| d);
            check_query_dimensions(embedding, dimensions)?;
            let entries = self.load_entries(conn)?;
            Ok(rank(self.metric, embedding, &entries, k))
        })
    }

    fn count(&self) -> Result<usize> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM entries WHERE collection = ?1",
                    rusqlite::params![self.name],
                    |row| row.get(0),
                )
                .map_err(|e| EmbedVaultError::Storage(e.to_string()))?;
            Ok(count as usize)
        })
    }

    fn delete(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM collections WHERE name = ?1",
                rusqlite::params![self.name],
            )
            .map_err(|e| {
                EmbedVaultError::Storage(format!("Failed to delete collection: {}", e))
            })?;
            info!(collection = %self.name, "Collection deleted");
            self.ensure_collection(conn)
        })
    }

    fn get_all(&self) -> Result<Vec<IndexedEntry>> {
        self.db.with_conn(|conn| self.load_entries(conn))
    }
}

/// Look up a collection's metric and dimension.
fn collection_row(
    conn: &Connection,
    name: &str,
) -> Result<Option<(DistanceMetric, Option<usize>)>> {
    let row = conn
        .query_row(
            "SELECT distance, dimensions FROM collections WHERE name = ?1",
            rusqlite::params![name],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)),
        )
        .optional()
        .map_err(|e| EmbedVaultError::Storage(e.to_string()))?;

    match row {
        Some((distance, dimensions)) => Ok(Some((
            parse_metric(&distance)?,
            dimensions.map(|d| d as usize),
        ))),
        None => Ok(None),
    }
}

fn metric_name(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "cosine",
        DistanceMetric::L2 => "l2",
    }
}

fn parse_metric(s: &str) -> Result<DistanceMetric> {
    match s {
        "cosine" => Ok(DistanceMetric::Cosine),
        "l2" => Ok(DistanceMetric::L2),
        other => Err(EmbedVaultError::Storage(format!(
            "Unknown distance metric: {}",
            other
        ))),
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(EmbedVaultError::Storage(format!(
            "Vector blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            id: id.to_string(),
            embedding,
            document: format!("document {}", id),
            metadata: BTreeMap::from([
                ("chunk_type".to_string(), "method".to_string()),
                ("file_path".to_string(), "A.java".to_string()),
            ]),
        }
    }

    fn open_store(db: Arc<Database>) -> SqliteVectorStore {
        SqliteVectorStore::open(db, "java_code", DistanceMetric::Cosine, "test").unwrap()
    }

    #[test]
    fn test_vector_blob_roundtrip() {
        let v = vec![0.1f32, -2.5, 3.25e-8, f32::MAX];
        assert_eq!(decode_vector(&encode_vector(&v)).unwrap(), v);
        assert!(decode_vector(&[0u8; 5]).is_err());
    }

    #[test]
    fn test_add_query_count() {
        let store = open_store(Arc::new(Database::in_memory().unwrap()));
        store
            .add(&[entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.dimensions().unwrap(), Some(2));

        let hits = store.query(&[1.0, 0.1], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].metadata["chunk_type"], "method");
        assert_eq!(hits[0].document, "document a");
    }

    #[test]
    fn test_add_upserts() {
        let store = open_store(Arc::new(Database::in_memory().unwrap()));
        store.add(&[entry("a", vec![1.0, 0.0])]).unwrap();
        let mut replacement = entry("a", vec![0.0, 1.0]);
        replacement.document = "replaced".to_string();
        store.add(&[replacement]).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].document, "replaced");
        assert_eq!(all[0].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let store = open_store(Arc::new(Database::in_memory().unwrap()));
        store.add(&[entry("a", vec![1.0, 0.0])]).unwrap();

        let result = store.add(&[entry("b", vec![1.0, 0.0]), entry("c", vec![1.0])]);
        assert!(matches!(result, Err(EmbedVaultError::Storage(_))));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Arc::new(Database::open_dir(dir.path()).unwrap());
            let store = open_store(db);
            store
                .add(&[entry("a", vec![1.0, 0.0]), entry("b", vec![0.5, 0.5])])
                .unwrap();
        }

        let db = Arc::new(Database::open_dir(dir.path()).unwrap());
        let store = open_store(db);
        assert_eq!(store.count().unwrap(), 2);
        let ids: Vec<_> = store.get_all().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_collections_are_isolated() {
        let db = Arc::new(Database::in_memory().unwrap());
        let first = open_store(Arc::clone(&db));
        let second =
            SqliteVectorStore::open(Arc::clone(&db), "other", DistanceMetric::Cosine, "").unwrap();

        first.add(&[entry("a", vec![1.0, 0.0])]).unwrap();
        assert_eq!(first.count().unwrap(), 1);
        assert_eq!(second.count().unwrap(), 0);
        assert!(second.query(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_with_other_metric_fails() {
        let db = Arc::new(Database::in_memory().unwrap());
        open_store(Arc::clone(&db));
        let result = SqliteVectorStore::open(db, "java_code", DistanceMetric::L2, "");
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_drops_entries() {
        let store = open_store(Arc::new(Database::in_memory().unwrap()));
        store.add(&[entry("a", vec![1.0, 0.0])]).unwrap();
        store.delete().unwrap();

        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.dimensions().unwrap(), None);
        store.add(&[entry("b", vec![1.0, 0.0, 0.0])]).unwrap();
        assert_eq!(store.dimensions().unwrap(), Some(3));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = open_store(Arc::new(Database::in_memory().unwrap()));
        store.add(&[entry("a", vec![1.0, 0.0])]).unwrap();
        assert!(store.query(&[1.0, 0.0, 0.0], 1).is_err());
    }
}

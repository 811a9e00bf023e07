//! Database schema migrations.
//!
//! Applies the collection schema: named collections with a fixed vector
//! dimension, and their entries keyed by caller-supplied ids.

use rusqlite::Connection;
use tracing::info;

use embedvault_core::error::EmbedVaultError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), EmbedVaultError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| EmbedVaultError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            EmbedVaultError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: collections");
    }

    Ok(())
}

/// Version 1: collections and entries.
fn apply_v1(conn: &Connection) -> Result<(), EmbedVaultError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS collections (
            name        TEXT PRIMARY KEY NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            distance    TEXT NOT NULL
                        CHECK (distance IN ('cosine', 'l2')),
            dimensions  INTEGER,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Vectors are little-endian f32 blobs; metadata is a flat JSON object.
        CREATE TABLE IF NOT EXISTS entries (
            collection  TEXT NOT NULL,
            id          TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            document    TEXT NOT NULL,
            metadata    TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'collections');
        ",
    )
    .map_err(|e| EmbedVaultError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}

//! Per-record JSON files for generated embeddings.
//!
//! Every embedding is written to `<root>/<partition>/<name>.json`, where the
//! partition is `documents` or `queries` and the name is
//! `{prefix}_{YYYYmmdd_HHMMSS_ffffff}_{excerpt}`. The excerpt is the first
//! 50 characters of the text with every non-alphanumeric character replaced
//! by `_`, so names stay filesystem-safe and greppable.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use embedvault_core::error::{EmbedVaultError, Result};
use embedvault_core::types::{EmbeddingKind, EmbeddingRecord};

/// Number of leading characters of the text kept in the filename.
pub const EXCERPT_CHARS: usize = 50;

/// Character substituted for anything that is not alphanumeric.
const FILLER: char = '_';

/// Attempts at finding a free filename before giving up.
const MAX_NAME_ATTEMPTS: usize = 1_000;

/// Replace every non-alphanumeric character of the first
/// [`EXCERPT_CHARS`] characters with `_`.
pub fn sanitize_excerpt(text: &str) -> String {
    text.chars()
        .take(EXCERPT_CHARS)
        .map(|c| if c.is_alphanumeric() { c } else { FILLER })
        .collect()
}

/// File name for a record of `kind` stamped at `timestamp`.
pub fn record_file_name(kind: EmbeddingKind, timestamp: DateTime<Utc>, text: &str) -> String {
    format!(
        "{}_{}_{}.json",
        kind.file_prefix(),
        timestamp.format("%Y%m%d_%H%M%S_%6f"),
        sanitize_excerpt(text)
    )
}

/// Writes embedding records into kind-partitioned directories.
///
/// Timestamps used in file names are strictly increasing per writer at
/// microsecond resolution, and files are created with create-new semantics,
/// so a write never replaces an existing record.
#[derive(Debug)]
pub struct RecordWriter {
    root: PathBuf,
    max_records_per_kind: usize,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl RecordWriter {
    /// Create a writer rooted at `root`, creating both partition directories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in [EmbeddingKind::Document, EmbeddingKind::Query] {
            std::fs::create_dir_all(root.join(kind.partition()))?;
        }
        debug!(root = %root.display(), "Record partitions ready");
        Ok(Self {
            root,
            max_records_per_kind: 0,
            last_timestamp: Mutex::new(None),
        })
    }

    /// Keep at most `max` files per partition, pruning the oldest after each
    /// write. Zero disables pruning.
    pub fn with_retention(mut self, max: usize) -> Self {
        self.max_records_per_kind = max;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn partition_dir(&self, kind: EmbeddingKind) -> PathBuf {
        self.root.join(kind.partition())
    }

    /// Current time truncated to microseconds, strictly later than the last
    /// timestamp this writer used for a file name.
    pub fn next_timestamp(&self) -> Result<DateTime<Utc>> {
        let now = Utc::now().trunc_subsecs(6);
        let last = self.lock_last()?;
        Ok(match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        })
    }

    /// Serialize `record` into its partition and return the file path.
    ///
    /// If the record's timestamp has to move forward to get a free name, the
    /// file is written with the moved timestamp so the name and
    /// `metadata.timestamp` always agree.
    pub fn write(&self, record: &EmbeddingRecord) -> Result<PathBuf> {
        let dir = self.partition_dir(record.kind());
        let mut last = self.lock_last()?;

        let mut stamp = record.metadata.timestamp.trunc_subsecs(6);
        if let Some(prev) = *last {
            if stamp <= prev {
                stamp = prev + Duration::microseconds(1);
            }
        }

        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(record_file_name(record.kind(), stamp, &record.text));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    *last = Some(stamp);
                    drop(last);

                    let stamped = if stamp == record.metadata.timestamp {
                        Cow::Borrowed(record)
                    } else {
                        let mut moved = record.clone();
                        moved.metadata.timestamp = stamp;
                        Cow::Owned(moved)
                    };
                    write_or_discard(&path, file, stamped.as_ref())?;
                    debug!(
                        path = %path.display(),
                        kind = %record.kind(),
                        "Embedding record written"
                    );

                    self.prune(record.kind())?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    stamp += Duration::microseconds(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EmbedVaultError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("No free record name in {}", dir.display()),
        )))
    }

    /// Remove the oldest files of `kind` beyond the retention limit.
    fn prune(&self, kind: EmbeddingKind) -> Result<usize> {
        if self.max_records_per_kind == 0 {
            return Ok(0);
        }
        let files = list_record_files(&self.partition_dir(kind))?;
        let excess = files.len().saturating_sub(self.max_records_per_kind);
        for path in files.iter().take(excess) {
            std::fs::remove_file(path)?;
        }
        if excess > 0 {
            debug!(kind = %kind, removed = excess, "Pruned old embedding records");
        }
        Ok(excess)
    }

    fn lock_last(&self) -> Result<std::sync::MutexGuard<'_, Option<DateTime<Utc>>>> {
        self.last_timestamp
            .lock()
            .map_err(|e| EmbedVaultError::Storage(format!("Writer lock poisoned: {}", e)))
    }
}

/// Write `value` as pretty JSON into the freshly created `file`. On failure
/// the partial file is removed so no unreadable record is left behind.
fn write_or_discard<T: Serialize>(path: &Path, file: File, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(file);
    let written = serde_json::to_writer_pretty(&mut writer, value)
        .map_err(EmbedVaultError::from)
        .and_then(|()| writer.flush().map_err(EmbedVaultError::from));

    if let Err(e) = written {
        drop(writer);
        if let Err(remove_err) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %remove_err, "Failed to remove partial record");
        }
        return Err(e);
    }
    Ok(())
}

/// Sorted `*.json` files in `dir`. A missing directory yields an empty list.
pub(crate) fn list_record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

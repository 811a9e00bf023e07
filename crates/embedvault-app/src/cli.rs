//! CLI argument definitions for the embedvault binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use embedvault_core::types::RecordScope;
use embedvault_storage::DEFAULT_SUMMARY_FILE;

/// embedvault: embed code fragments, keep every vector on disk, search them.
#[derive(Parser, Debug)]
#[command(name = "embedvault", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the per-record JSON files.
    #[arg(short = 'd', long = "embedding-dir", global = true)]
    pub embedding_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Use the deterministic mock provider instead of the ONNX model.
    #[arg(long = "mock", global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Embed fragments from a JSON array file and add them to the collection.
    Ingest {
        /// JSON file containing an array of code fragments.
        fragments: PathBuf,
        /// Entries per store call; defaults to `store.batch_size`.
        #[arg(short = 'b', long = "batch-size")]
        batch_size: Option<usize>,
    },
    /// Find the fragments closest to a query.
    Search {
        query: String,
        /// Number of results; defaults to `search.default_limit`.
        #[arg(short = 'n', long = "n-results")]
        n_results: Option<usize>,
    },
    /// List saved record files.
    List {
        #[arg(default_value = "all")]
        scope: RecordScope,
    },
    /// Print one saved record.
    Show {
        /// Record path or bare file name.
        record: String,
    },
    /// Compare two saved records.
    Compare { a: String, b: String },
    /// Delete saved record files.
    Clear {
        #[arg(default_value = "all")]
        scope: RecordScope,
    },
    /// Write a JSON summary of all saved records.
    Export {
        #[arg(short = 'o', long = "output", default_value = DEFAULT_SUMMARY_FILE)]
        output: String,
    },
    /// Show model, collection and disk usage information.
    Stats,
    /// Print the number of entries in the collection.
    Count,
    /// Delete the vector store collection. Record files are kept.
    DropCollection,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > EMBEDVAULT_CONFIG env var > platform default
    /// (~/.embedvault/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("EMBEDVAULT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".embedvault").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".embedvault").join("config.toml");
    }
    PathBuf::from("config.toml")
}

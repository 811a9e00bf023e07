use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EmbedVaultError, Result};

/// Top-level configuration for embedvault.
///
/// Loaded from `~/.embedvault/config.toml` by default. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedVaultConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl EmbedVaultConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EmbedVaultConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EmbedVaultError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.store.batch_size == 0 {
            return Err(EmbedVaultError::Config(
                "store.batch_size must be at least 1".to_string(),
            ));
        }
        if self.model.dimensions == 0 {
            return Err(EmbedVaultError::Config(
                "model.dimensions must be at least 1".to_string(),
            ));
        }
        if self.search.default_limit == 0 {
            return Err(EmbedVaultError::Config(
                "search.default_limit must be at least 1".to_string(),
            ));
        }
        if self.store.collection_name.trim().is_empty() {
            return Err(EmbedVaultError::Config(
                "store.collection_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// On-disk embedding record settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Root directory holding the `documents/` and `queries/` partitions.
    pub directory: PathBuf,
    /// Whether every generated embedding is written to disk.
    pub save_embeddings: bool,
    /// Maximum record files kept per partition; oldest are pruned first.
    /// Zero keeps everything.
    pub max_records_per_kind: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./embeddings"),
            save_embeddings: true,
            max_records_per_kind: 0,
        }
    }
}

/// Which embedding provider implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Sentence-transformer ONNX model.
    Onnx,
    /// Deterministic hash-based vectors.
    Mock,
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name recorded in every embedding record.
    pub name: String,
    /// Directory containing `model.onnx` and `tokenizer.json`.
    pub model_dir: Option<PathBuf>,
    /// Expected embedding dimension (used by the mock provider).
    pub dimensions: usize,
    /// Maximum number of tokens fed to the model; longer input is truncated.
    pub max_seq_length: usize,
    /// Provider implementation.
    pub provider: ProviderKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            dimensions: 384,
            max_seq_length: 256,
            provider: ProviderKind::Onnx,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Persistent collection in a SQLite file.
    Sqlite,
    /// Process-local collection, lost on exit.
    Memory,
}

/// Distance metric used by the vector store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Squared Euclidean distance.
    L2,
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory holding the SQLite collection database.
    pub persist_directory: PathBuf,
    pub collection_name: String,
    /// Maximum entries per `add` call during ingestion.
    pub batch_size: usize,
    pub distance: DistanceMetric,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            persist_directory: PathBuf::from("./vector_db"),
            collection_name: "java_code".to_string(),
            batch_size: 100,
            distance: DistanceMetric::Cosine,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results returned when the caller does not specify one.
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

use thiserror::Error;

/// Top-level error type for embedvault.
///
/// Every failure is surfaced to the immediate caller; nothing in the
/// workspace retries. Conversions from the underlying library errors are
/// provided so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmbedVaultError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

impl From<toml::de::Error> for EmbedVaultError {
    fn from(err: toml::de::Error) -> Self {
        EmbedVaultError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EmbedVaultError {
    fn from(err: toml::ser::Error) -> Self {
        EmbedVaultError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for EmbedVaultError {
    fn from(err: serde_json::Error) -> Self {
        EmbedVaultError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for embedvault operations.
pub type Result<T> = std::result::Result<T, EmbedVaultError>;

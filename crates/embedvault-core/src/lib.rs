pub mod config;
pub mod error;
pub mod types;

pub use config::EmbedVaultConfig;
pub use error::{EmbedVaultError, Result};
pub use types::*;

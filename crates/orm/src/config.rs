//! Loader configuration types and builders

use serde::{Deserialize, Serialize};
use service_builder::builder;

use crate::error::{LoadError, LoadResult};

/// Number of primary keys per store query; matches the select-in chunk size
/// used by common ORMs
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Configuration for sessions and the batch loader
#[derive(Debug, Clone, Serialize, Deserialize)]
#[builder]
pub struct LoaderConfig {
    /// Maximum number of primary keys in one store query
    #[builder(default = "500", getter)]
    pub chunk_size: usize,

    /// Upgrade plain deferred loads to batch loads for the whole session
    #[builder(default = "false", getter)]
    pub safeguard: bool,

    /// Emit a warning record for every batch load
    #[builder(default = "true", getter)]
    pub log_batches: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            safeguard: false,
            log_batches: true,
        }
    }
}

impl LoaderConfig {
    /// Validate the configuration
    pub fn validate(&self) -> LoadResult<()> {
        if self.chunk_size == 0 {
            return Err(LoadError::configuration("chunk_size must be at least 1"));
        }

        Ok(())
    }
}

impl LoaderConfigBuilder {
    /// Development configuration: batch loads are logged
    pub fn development() -> Self {
        LoaderConfigBuilder::new().log_batches(true)
    }

    /// Production configuration: every plain lazy load is batched across the session
    pub fn production() -> Self {
        LoaderConfigBuilder::new().safeguard(true).log_batches(true)
    }

    /// Testing configuration: quiet, no implicit batching
    pub fn testing() -> Self {
        LoaderConfigBuilder::new().safeguard(false).log_batches(false)
    }
}

//! Error types for the batch loading system
//!
//! Declaration errors (`UnknownAttribute`, `UnknownEntity`) surface when a
//! query is built. Touch-time errors (`LazyLoadForbidden`, `Store`) surface
//! from `Session::get`. Nothing is swallowed or retried internally.

use thiserror::Error;

use crate::model::PrimaryKey;
use crate::session::InstanceId;

/// Result type alias for loading operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for declarations, sessions and attribute loading
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unknown attribute '{attribute}' on entity '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("Unknown entity type '{entity}'")]
    UnknownEntity { entity: String },

    #[error("{entity}.{attribute} is not available due to raise-on-touch")]
    LazyLoadForbidden { entity: String, attribute: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Instance {id} is not part of this session")]
    InstanceNotFound { id: InstanceId },

    #[error("Instance {id} has no primary key yet")]
    NotPersistent { id: InstanceId },

    #[error("{entity}{key} no longer exists in the store")]
    ObjectDeleted { entity: String, key: PrimaryKey },

    #[error("Schema error: {message}")]
    Schema { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl LoadError {
    pub fn unknown_attribute(entity: &str, attribute: &str) -> Self {
        Self::UnknownAttribute {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn unknown_entity(entity: &str) -> Self {
        Self::UnknownEntity {
            entity: entity.to_string(),
        }
    }

    pub fn lazy_load_forbidden(entity: &str, attribute: &str) -> Self {
        Self::LazyLoadForbidden {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error came out of the store rather than the loader itself
    pub fn is_store_failure(&self) -> bool {
        matches!(self, LoadError::Store(_))
    }
}

/// Error type reported by `Store` implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Row {key} not found in '{entity}'")]
    RowNotFound { entity: String, key: PrimaryKey },

    #[error("Store backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Session errors raised while a store merges rows; store errors pass through as-is
impl From<LoadError> for StoreError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Store(inner) => inner,
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

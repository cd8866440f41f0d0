//! # elif-batchload: Batch-on-touch loading for elif.rs
//!
//! Solves the N+1 query problem for instances held in a session. The first
//! touch of an unloaded attribute loads it for every sibling of the same
//! entity type in the session with one query per chunk of primary keys.
//!
//! ```ignore
//! let query = Query::new(&schema, "Number")?
//!     .options(default_columns().batch_on_touch(["*"], BatchOptions::default()))?;
//! let numbers = query.all(&mut session, &mut store)?;
//!
//! // One query loads `fruits` for every number in the session
//! let fruits = session.get(numbers[0], "fruits", &mut store)?;
//! ```
//!
//! Loading strategies are declared per query (`loading::options`), resolved
//! into a plan (`loading::plan`) and registered per instance and attribute
//! when rows are materialized (`session`). Rows come from a `store::Store`.

pub mod config;
pub mod error;
pub mod loading;
pub mod model;
pub mod query;
pub mod relationships;
pub mod session;
pub mod store;

// Re-export core types
pub use config::{LoaderConfig, LoaderConfigBuilder, DEFAULT_CHUNK_SIZE};
pub use error::{LoadError, LoadResult, StoreError, StoreResult};
pub use loading::options::{
    batch_on_touch, batch_on_touch_columns, batch_on_touch_relationships, default_columns, defer,
    eager, joined, lazy, load_only, raise_on_touch, raise_on_touch_columns,
    raise_on_touch_relationships, relationship_strategy, undefer,
};
pub use loading::{
    bulk_load_attribute, rewrite, BatchLoadResult, BatchLoader, BatchOptions, Load, LoadNode,
    LoadPlan, LoadingStrategy,
};
pub use model::{
    AttributeDescriptor, AttributeKind, EntityType, EntityTypeBuilder, KeyValue, PrimaryKey, Row,
    Schema, Value,
};
pub use query::{FetchQuery, Query};
pub use relationships::{JoinColumns, RelationshipMetadata};
pub use session::{AttributeValue, InstanceId, LoadState, Lifecycle, Session};
pub use store::{MemoryStore, QueryLog, Store};

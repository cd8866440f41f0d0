//! Model System - schema metadata for entities held in a session
//!
//! - `primary_key`: key values and composite primary keys
//! - `attribute`: per-attribute descriptors (scalar or relationship)
//! - `entity`: entity types and their builder
//! - `schema`: registry of entity types

pub mod attribute;
pub mod entity;
pub mod primary_key;
pub mod schema;

pub use attribute::{AttributeDescriptor, AttributeKind};
pub use entity::{EntityType, EntityTypeBuilder};
pub use primary_key::{KeyValue, PrimaryKey};
pub use schema::Schema;

/// Scalar attribute value
pub use serde_json::Value;

/// A row as handed from a store to the session: column name to value
pub type Row = serde_json::Map<String, Value>;

//! Relationships Module - join metadata for relationship attributes

pub mod metadata;

pub use metadata::{JoinColumns, RelationshipMetadata};

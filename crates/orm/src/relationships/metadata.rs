//! Relationship Metadata - join configuration for relationship attributes

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};

/// Column pairing between the owning entity and the related entity.
///
/// `local[i]` on the owner matches `remote[i]` on the related entity. For a
/// to-one relationship the local side usually holds the foreign key; for a
/// to-many relationship the remote side does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumns {
    pub local: Vec<String>,
    pub remote: Vec<String>,
}

impl JoinColumns {
    /// Create a join over a single column pair
    pub fn simple(local: &str, remote: &str) -> Self {
        Self {
            local: vec![local.to_string()],
            remote: vec![remote.to_string()],
        }
    }

    /// Create a join over several column pairs
    pub fn composite(pairs: &[(&str, &str)]) -> Self {
        Self {
            local: pairs.iter().map(|(local, _)| local.to_string()).collect(),
            remote: pairs.iter().map(|(_, remote)| remote.to_string()).collect(),
        }
    }

    /// Iterate (local, remote) column pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.local
            .iter()
            .zip(self.remote.iter())
            .map(|(local, remote)| (local.as_str(), remote.as_str()))
    }

    /// Validate the join configuration
    pub fn validate(&self) -> LoadResult<()> {
        if self.local.is_empty() {
            return Err(LoadError::schema("Join configuration must have at least one column pair"));
        }

        if self.local.len() != self.remote.len() {
            return Err(LoadError::schema(format!(
                "Join configuration pairs {} local column(s) with {} remote column(s)",
                self.local.len(),
                self.remote.len()
            )));
        }

        Ok(())
    }
}

/// Relationship-specific part of an attribute descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// Name of the related entity type
    pub related_entity: String,

    /// How owner rows join to related rows
    pub join: JoinColumns,

    /// For keyed collections: the related entity's scalar attribute used as map key
    pub key_attribute: Option<String>,
}

impl RelationshipMetadata {
    pub fn new(related_entity: &str, join: JoinColumns) -> Self {
        Self {
            related_entity: related_entity.to_string(),
            join,
            key_attribute: None,
        }
    }

    /// Key the collection by an attribute of the related rows
    pub fn keyed_by(mut self, key_attribute: &str) -> Self {
        self.key_attribute = Some(key_attribute.to_string());
        self
    }

    pub fn validate(&self) -> LoadResult<()> {
        if self.related_entity.is_empty() {
            return Err(LoadError::schema("Relationship must name a related entity"));
        }

        if let Some(ref key) = self.key_attribute {
            if key.is_empty() {
                return Err(LoadError::schema("Keyed relationship must name its key attribute"));
            }
        }

        self.join.validate()
    }
}

//! Attribute descriptors - static per-attribute metadata of an entity type

use serde::{Deserialize, Serialize};

use crate::loading::strategy::LoadingStrategy;
use crate::relationships::metadata::{JoinColumns, RelationshipMetadata};

/// Shape of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Column-like scalar value
    Scalar,
    /// Reference to at most one related instance
    ToOne,
    /// Ordered sequence of related instances
    ToMany,
    /// Related instances keyed by one of their attributes
    Keyed,
}

impl AttributeKind {
    pub fn is_relationship(self) -> bool {
        !matches!(self, AttributeKind::Scalar)
    }

    /// Returns true if this attribute holds a collection of instances
    pub fn is_collection(self) -> bool {
        matches!(self, AttributeKind::ToMany | AttributeKind::Keyed)
    }
}

/// Descriptor of one attribute of an entity type. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    name: String,
    owner: String,
    kind: AttributeKind,
    primary_key: bool,
    default_strategy: LoadingStrategy,
    relationship: Option<RelationshipMetadata>,
}

impl AttributeDescriptor {
    /// Scalar column, loaded with its instance by default
    pub fn column(owner: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            kind: AttributeKind::Scalar,
            primary_key: false,
            default_strategy: LoadingStrategy::Eager,
            relationship: None,
        }
    }

    /// Relationship attribute, loaded on first touch by default
    pub fn relationship(
        owner: &str,
        name: &str,
        kind: AttributeKind,
        metadata: RelationshipMetadata,
    ) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            kind,
            primary_key: false,
            default_strategy: LoadingStrategy::Deferred,
            relationship: Some(metadata),
        }
    }

    pub(crate) fn into_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.default_strategy = LoadingStrategy::Eager;
        self
    }

    /// Override the default strategy
    pub fn with_default_strategy(mut self, strategy: LoadingStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the entity type owning this attribute
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == AttributeKind::Scalar
    }

    pub fn is_relationship(&self) -> bool {
        self.kind.is_relationship()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default_strategy(&self) -> LoadingStrategy {
        self.default_strategy
    }

    pub fn relationship_metadata(&self) -> Option<&RelationshipMetadata> {
        self.relationship.as_ref()
    }

    /// Related entity type name, for relationships
    pub fn related_entity(&self) -> Option<&str> {
        self.relationship.as_ref().map(|r| r.related_entity.as_str())
    }

    /// Join columns, for relationships
    pub fn join(&self) -> Option<&JoinColumns> {
        self.relationship.as_ref().map(|r| &r.join)
    }

    /// Map key attribute of the related entity, for keyed relationships
    pub fn key_attribute(&self) -> Option<&str> {
        self.relationship.as_ref().and_then(|r| r.key_attribute.as_deref())
    }
}

//! Entity types - schema-level description of a row kind

use std::collections::HashMap;

use crate::error::{LoadError, LoadResult};
use crate::loading::strategy::LoadingStrategy;
use crate::relationships::metadata::{JoinColumns, RelationshipMetadata};

use super::attribute::{AttributeDescriptor, AttributeKind};

/// An entity type: table name, ordered primary key and attribute descriptor table
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    table: String,
    primary_key: Vec<String>,
    attributes: Vec<AttributeDescriptor>,
    index: HashMap<String, usize>,
}

impl EntityType {
    /// Start describing an entity type
    pub fn builder(name: &str) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary-key attribute names, in key order
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn is_primary_key(&self, attribute: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == attribute)
    }

    /// All attribute descriptors in declaration order
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.index.get(name).map(|&i| &self.attributes[i])
    }

    /// Look up an attribute, failing with `UnknownAttribute`
    pub fn require(&self, name: &str) -> LoadResult<&AttributeDescriptor> {
        self.attribute(name)
            .ok_or_else(|| LoadError::unknown_attribute(&self.name, name))
    }

    /// Look up a relationship attribute, failing with `UnknownAttribute` for scalars too
    pub fn require_relationship(&self, name: &str) -> LoadResult<&AttributeDescriptor> {
        match self.attribute(name) {
            Some(descriptor) if descriptor.is_relationship() => Ok(descriptor),
            _ => Err(LoadError::unknown_attribute(&self.name, name)),
        }
    }

    /// Look up a scalar attribute, failing with `UnknownAttribute` for relationships too
    pub fn require_column(&self, name: &str) -> LoadResult<&AttributeDescriptor> {
        match self.attribute(name) {
            Some(descriptor) if descriptor.is_scalar() => Ok(descriptor),
            _ => Err(LoadError::unknown_attribute(&self.name, name)),
        }
    }

    /// Scalar attributes, primary key included
    pub fn columns(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| a.is_scalar())
    }

    pub fn relationships(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| a.is_relationship())
    }
}

/// Builder for `EntityType`
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name: String,
    table: Option<String>,
    primary_key: Vec<String>,
    attributes: Vec<AttributeDescriptor>,
}

impl EntityTypeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: None,
            primary_key: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Storage table name; defaults to the lowercased entity name
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Primary-key attributes, in key order. Undeclared key columns are added as scalars.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Scalar column loaded with its instance
    pub fn column(self, name: &str) -> Self {
        let descriptor = AttributeDescriptor::column(&self.name, name);
        self.attribute(descriptor)
    }

    /// Scalar column deferred by default
    pub fn deferred_column(self, name: &str) -> Self {
        let descriptor = AttributeDescriptor::column(&self.name, name)
            .with_default_strategy(LoadingStrategy::Deferred);
        self.attribute(descriptor)
    }

    /// Reference to at most one related instance
    pub fn to_one(self, name: &str, related: &str, join: JoinColumns) -> Self {
        let descriptor = AttributeDescriptor::relationship(
            &self.name,
            name,
            AttributeKind::ToOne,
            RelationshipMetadata::new(related, join),
        );
        self.attribute(descriptor)
    }

    /// Ordered collection of related instances
    pub fn to_many(self, name: &str, related: &str, join: JoinColumns) -> Self {
        let descriptor = AttributeDescriptor::relationship(
            &self.name,
            name,
            AttributeKind::ToMany,
            RelationshipMetadata::new(related, join),
        );
        self.attribute(descriptor)
    }

    /// Collection of related instances keyed by `key_attribute` of the related rows
    pub fn keyed(self, name: &str, related: &str, join: JoinColumns, key_attribute: &str) -> Self {
        let descriptor = AttributeDescriptor::relationship(
            &self.name,
            name,
            AttributeKind::Keyed,
            RelationshipMetadata::new(related, join).keyed_by(key_attribute),
        );
        self.attribute(descriptor)
    }

    /// Add a prebuilt descriptor
    pub fn attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.attributes.push(descriptor);
        self
    }

    pub fn build(self) -> LoadResult<EntityType> {
        if self.name.is_empty() {
            return Err(LoadError::schema("Entity type name cannot be empty"));
        }

        if self.primary_key.is_empty() {
            return Err(LoadError::schema(format!(
                "Entity type '{}' has no primary key",
                self.name
            )));
        }

        let mut attributes = Vec::with_capacity(self.attributes.len() + self.primary_key.len());
        for pk in &self.primary_key {
            if !self.attributes.iter().any(|a| a.name() == pk) {
                attributes.push(AttributeDescriptor::column(&self.name, pk).into_primary_key());
            }
        }

        for descriptor in self.attributes {
            if descriptor.owner() != self.name {
                return Err(LoadError::schema(format!(
                    "Attribute '{}' belongs to '{}', not '{}'",
                    descriptor.name(),
                    descriptor.owner(),
                    self.name
                )));
            }

            if self.primary_key.iter().any(|pk| pk == descriptor.name()) {
                if !descriptor.is_scalar() {
                    return Err(LoadError::schema(format!(
                        "Primary key attribute '{}.{}' must be a scalar",
                        self.name,
                        descriptor.name()
                    )));
                }
                attributes.push(descriptor.into_primary_key());
            } else {
                if let Some(metadata) = descriptor.relationship_metadata() {
                    metadata.validate()?;
                }
                attributes.push(descriptor);
            }
        }

        let mut index = HashMap::with_capacity(attributes.len());
        for (i, descriptor) in attributes.iter().enumerate() {
            if index.insert(descriptor.name().to_string(), i).is_some() {
                return Err(LoadError::schema(format!(
                    "Attribute '{}' declared twice on '{}'",
                    descriptor.name(),
                    self.name
                )));
            }
        }

        Ok(EntityType {
            table: self.table.unwrap_or_else(|| self.name.to_lowercase()),
            name: self.name,
            primary_key: self.primary_key,
            attributes,
            index,
        })
    }
}

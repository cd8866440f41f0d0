//! Schema - the set of entity types a session works with

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};

use super::attribute::{AttributeDescriptor, AttributeKind};
use super::entity::EntityType;

/// Registry of entity types by name
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<String, Arc<EntityType>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type
    pub fn register(&mut self, entity: EntityType) -> LoadResult<Arc<EntityType>> {
        if self.entities.contains_key(entity.name()) {
            return Err(LoadError::schema(format!(
                "Entity type '{}' registered twice",
                entity.name()
            )));
        }

        let entity = Arc::new(entity);
        self.entities.insert(entity.name().to_string(), entity.clone());
        Ok(entity)
    }

    /// Builder-style registration
    pub fn with(mut self, entity: EntityType) -> LoadResult<Self> {
        self.register(entity)?;
        Ok(self)
    }

    /// Look up an entity type, failing with `UnknownEntity`
    pub fn entity(&self, name: &str) -> LoadResult<Arc<EntityType>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::unknown_entity(name))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entities.values()
    }

    /// Entity type a relationship descriptor points at
    pub fn related(&self, descriptor: &AttributeDescriptor) -> LoadResult<Arc<EntityType>> {
        let related = descriptor.related_entity().ok_or_else(|| {
            LoadError::schema(format!(
                "'{}.{}' is not a relationship",
                descriptor.owner(),
                descriptor.name()
            ))
        })?;
        self.entity(related)
    }

    /// Check that every relationship points at a registered entity type and
    /// that its join and key columns exist on both sides
    pub fn validate(&self) -> LoadResult<()> {
        for entity in self.entities.values() {
            for descriptor in entity.relationships() {
                let related = self.related(descriptor)?;
                let join = descriptor.join().ok_or_else(|| {
                    LoadError::schema(format!(
                        "'{}.{}' has no join",
                        entity.name(),
                        descriptor.name()
                    ))
                })?;

                for (local, remote) in join.pairs() {
                    entity.require_column(local)?;
                    related.require_column(remote)?;
                }

                if descriptor.kind() == AttributeKind::Keyed {
                    let key = descriptor.key_attribute().ok_or_else(|| {
                        LoadError::schema(format!(
                            "Keyed relationship '{}.{}' has no key attribute",
                            entity.name(),
                            descriptor.name()
                        ))
                    })?;
                    related.require_column(key)?;
                }
            }
        }

        Ok(())
    }

    /// Validate and freeze the schema for sharing between sessions, queries and stores
    pub fn finish(self) -> LoadResult<Arc<Self>> {
        self.validate()?;
        tracing::debug!(entities = self.entities.len(), "Schema finished");
        Ok(Arc::new(self))
    }
}

//! Identity map: at most one live instance per (entity type, primary key)

use std::collections::HashMap;

use crate::model::PrimaryKey;

use super::state::InstanceId;

/// Identity of a persistent instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub entity: String,
    pub key: PrimaryKey,
}

impl IdentityKey {
    pub fn new(entity: &str, key: PrimaryKey) -> Self {
        Self {
            entity: entity.to_string(),
            key,
        }
    }
}

/// Lookup by identity, plus per-type listing in registration order
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    by_identity: HashMap<IdentityKey, InstanceId>,
    by_entity: HashMap<String, Vec<InstanceId>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: &str, key: &PrimaryKey) -> Option<InstanceId> {
        // Borrowed lookups need an owned key with this layout
        self.by_identity
            .get(&IdentityKey::new(entity, key.clone()))
            .copied()
    }

    /// Register an identity; returns the already registered instance if there is one
    pub fn insert(
        &mut self,
        entity: &str,
        key: PrimaryKey,
        id: InstanceId,
    ) -> Result<(), InstanceId> {
        let identity = IdentityKey::new(entity, key);
        if let Some(existing) = self.by_identity.get(&identity) {
            return Err(*existing);
        }

        self.by_identity.insert(identity, id);
        self.by_entity.entry(entity.to_string()).or_default().push(id);
        Ok(())
    }

    /// Persistent instances of one entity type, in registration order
    pub fn instances_of(&self, entity: &str) -> &[InstanceId] {
        self.by_entity.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_identity.clear();
        self.by_entity.clear();
    }
}

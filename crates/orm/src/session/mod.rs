//! Session - the identity registry that owns every instance of one unit of work
//!
//! Instances are addressed through `InstanceId` tokens. Rows coming from a
//! store are turned into instances by `Session::materialize`, which also
//! records which loader governs each attribute left unloaded. Reading an
//! attribute through `Session::get` either returns the loaded value or runs
//! that loader.
//!
//! A session is mutated through `&mut self` only and is not meant to be
//! shared between threads while it is being used.

pub mod identity;
pub mod state;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::error::{LoadError, LoadResult};
use crate::loading::{self, plan::LoadNode, strategy::LoadingStrategy};
use crate::model::{
    AttributeDescriptor, AttributeKind, EntityType, KeyValue, PrimaryKey, Row, Schema, Value,
};
use crate::store::Store;

pub use identity::{IdentityKey, IdentityMap};
pub use state::{AttributeValue, InstanceId, InstanceState, LoadState, Lifecycle};

/// Loader registered for one unloaded attribute of one instance
#[derive(Debug, Clone)]
pub struct PendingLoader {
    pub strategy: LoadingStrategy,
    /// Plan node the owning instance was materialized through
    pub node: Arc<LoadNode>,
}

/// Identity registry and attribute access point
#[derive(Debug)]
pub struct Session {
    schema: Arc<Schema>,
    config: LoaderConfig,
    instances: Vec<InstanceState>,
    identity: IdentityMap,
    loaders: HashMap<(InstanceId, String), PendingLoader>,
    safeguard: bool,
}

impl Session {
    /// Create a session with the default loader configuration
    pub fn new(schema: Arc<Schema>) -> Self {
        let config = LoaderConfig::default();
        Self {
            schema,
            safeguard: *config.get_safeguard(),
            config,
            instances: Vec::new(),
            identity: IdentityMap::new(),
            loaders: HashMap::new(),
        }
    }

    pub fn with_config(schema: Arc<Schema>, config: LoaderConfig) -> LoadResult<Self> {
        config.validate()?;
        Ok(Self {
            safeguard: *config.get_safeguard(),
            config,
            ..Self::new(schema)
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Upgrade plain deferred loads to batch loads for the rest of the session
    pub fn enable_safeguard(&mut self) {
        self.safeguard = true;
    }

    pub fn is_safeguarded(&self) -> bool {
        self.safeguard
    }

    /// Number of instances held
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Add a locally created instance with the given scalar values
    pub fn add(&mut self, entity: &str, values: Row) -> LoadResult<InstanceId> {
        let entity = self.schema.entity(entity)?;
        for name in values.keys() {
            entity.require_column(name)?;
        }

        let mut state = InstanceState::pending(entity);
        for (name, value) in values {
            state.commit_if_unloaded(&name, AttributeValue::Scalar(value));
        }

        let id = InstanceId::new(self.instances.len());
        self.instances.push(state);
        Ok(id)
    }

    /// Turn a store row into an instance through a plan node.
    ///
    /// If the identity is already held, the existing instance is returned and
    /// only its unloaded scalars present in the row are filled in; loaded
    /// values and local modifications are left alone. Expired instances wait
    /// for their own refresh and are not touched.
    pub fn materialize(&mut self, node: &Arc<LoadNode>, row: &Row) -> LoadResult<InstanceId> {
        let entity = node.entity().clone();
        let key = row_key(&entity, row)?;

        if let Some(id) = self.identity.get(entity.name(), &key) {
            if !self.instance(id)?.is_expired() {
                self.fill_columns(id, &entity, row)?;
            }
            return Ok(id);
        }

        let id = InstanceId::new(self.instances.len());
        self.instances
            .push(InstanceState::persistent(entity.clone(), key.clone(), node.clone()));
        if let Err(existing) = self.identity.insert(entity.name(), key, id) {
            // Unreachable after the lookup above; keep the registry consistent anyway
            self.instances.pop();
            return Ok(existing);
        }

        self.fill_columns(id, &entity, row)?;
        self.register_loaders(id)?;

        tracing::trace!(entity = entity.name(), instance = %id, "Materialized instance");
        Ok(id)
    }

    /// Re-populate an expired instance from a freshly selected row
    pub fn refresh_from_row(&mut self, id: InstanceId, row: &Row) -> LoadResult<()> {
        let entity = self.instance(id)?.entity().clone();
        self.instance_mut(id)?.clear_expired();
        self.fill_columns(id, &entity, row)?;
        self.register_loaders(id)
    }

    fn fill_columns(&mut self, id: InstanceId, entity: &EntityType, row: &Row) -> LoadResult<()> {
        for descriptor in entity.columns() {
            if let Some(value) = row.get(descriptor.name()) {
                self.set_committed(id, descriptor.name(), AttributeValue::Scalar(value.clone()))?;
            }
        }
        Ok(())
    }

    /// Register a loader for every unloaded attribute that has none, following
    /// the instance's plan node. Eager attributes the row did not carry fall
    /// back to plain deferred loading.
    fn register_loaders(&mut self, id: InstanceId) -> LoadResult<()> {
        let state = self.instance(id)?;
        let node = match state.node() {
            Some(node) => node.clone(),
            None => return Ok(()),
        };

        let entity = state.entity().clone();
        for descriptor in entity.attributes() {
            let name = descriptor.name();
            if self.instances[id.index()].is_loaded(name)
                || self.loaders.contains_key(&(id, name.to_string()))
            {
                continue;
            }

            let strategy = match node.strategy_for(name) {
                Some(LoadingStrategy::Eager) | None => LoadingStrategy::Deferred,
                Some(strategy) => strategy,
            };
            self.loaders.insert(
                (id, name.to_string()),
                PendingLoader {
                    strategy,
                    node: node.clone(),
                },
            );
        }

        Ok(())
    }

    /// Write a committed value if the attribute is still unloaded.
    ///
    /// Returns whether the value was written. Local modifications are never
    /// touched.
    pub fn set_committed(
        &mut self,
        id: InstanceId,
        attribute: &str,
        value: AttributeValue,
    ) -> LoadResult<bool> {
        let descriptor = self.instance(id)?.entity().require(attribute)?.clone();
        check_shape(&descriptor, &value)?;

        let written = self.instance_mut(id)?.commit_if_unloaded(attribute, value);
        if written {
            self.loaders.remove(&(id, attribute.to_string()));
        }
        Ok(written)
    }

    /// Record an uncommitted local modification
    pub fn set(
        &mut self,
        id: InstanceId,
        attribute: &str,
        value: AttributeValue,
    ) -> LoadResult<()> {
        let descriptor = self.instance(id)?.entity().require(attribute)?.clone();
        check_shape(&descriptor, &value)?;
        self.instance_mut(id)?.modify(attribute, value);
        Ok(())
    }

    /// Read an attribute, loading it through its registered loader if needed
    pub fn get(
        &mut self,
        id: InstanceId,
        attribute: &str,
        store: &mut dyn Store,
    ) -> LoadResult<AttributeValue> {
        let (descriptor, held) = {
            let state = self.instance(id)?;
            let descriptor = state.entity().require(attribute)?.clone();
            // An expired baseline is stale; local modifications still win
            let committed = state
                .committed(attribute)
                .filter(|_| !state.is_expired() || descriptor.is_primary_key());
            let held = state.modified(attribute).or(committed).cloned();
            (descriptor, held)
        };

        let value = match held {
            Some(value) => value,
            None => loading::load_attribute(self, store, id, attribute)?,
        };

        self.present(&descriptor, value, store)
    }

    /// Convenience accessor for scalar attributes
    pub fn get_scalar(
        &mut self,
        id: InstanceId,
        attribute: &str,
        store: &mut dyn Store,
    ) -> LoadResult<Value> {
        match self.get(id, attribute, store)? {
            AttributeValue::Scalar(value) => Ok(value),
            _ => Err(LoadError::schema(format!("'{}' is not a scalar attribute", attribute))),
        }
    }

    /// Keyed relationships are stored as a sequence; rebuild the keyed view
    /// from the key attribute of each related instance
    fn present(
        &mut self,
        descriptor: &AttributeDescriptor,
        value: AttributeValue,
        store: &mut dyn Store,
    ) -> LoadResult<AttributeValue> {
        let related = match (descriptor.kind(), value) {
            (AttributeKind::Keyed, AttributeValue::Many(related)) => related,
            (_, value) => return Ok(value),
        };

        let key_attribute = descriptor
            .key_attribute()
            .ok_or_else(|| {
                LoadError::schema(format!("'{}' has no key attribute", descriptor.name()))
            })?
            .to_string();

        let mut keyed = BTreeMap::new();
        for related_id in related {
            let key = self.get_scalar(related_id, &key_attribute, store)?;
            let key = KeyValue::from_value(&key).ok_or_else(|| {
                LoadError::schema(format!(
                    "Value {} of '{}' cannot key '{}'",
                    key,
                    key_attribute,
                    descriptor.name()
                ))
            })?;
            keyed.insert(key, related_id);
        }

        Ok(AttributeValue::Keyed(keyed))
    }

    pub fn instance(&self, id: InstanceId) -> LoadResult<&InstanceState> {
        self.instances
            .get(id.index())
            .ok_or(LoadError::InstanceNotFound { id })
    }

    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> LoadResult<&mut InstanceState> {
        self.instances
            .get_mut(id.index())
            .ok_or(LoadError::InstanceNotFound { id })
    }

    pub fn is_loaded(&self, id: InstanceId, attribute: &str) -> bool {
        self.instances
            .get(id.index())
            .map_or(false, |state| state.is_loaded(attribute))
    }

    pub fn load_state(&self, id: InstanceId, attribute: &str) -> LoadResult<LoadState> {
        Ok(self.instance(id)?.load_state(attribute))
    }

    /// Baseline value without triggering any load
    pub fn committed_value(&self, id: InstanceId, attribute: &str) -> Option<&AttributeValue> {
        self.instances.get(id.index())?.committed(attribute)
    }

    /// Primary key of a persistent instance
    pub fn key(&self, id: InstanceId) -> LoadResult<&PrimaryKey> {
        self.instance(id)?
            .key()
            .ok_or(LoadError::NotPersistent { id })
    }

    /// Instance held for an identity
    pub fn find(&self, entity: &str, key: &PrimaryKey) -> Option<InstanceId> {
        self.identity.get(entity, key)
    }

    /// Persistent instances of one entity type, in materialization order
    pub fn instances_of(&self, entity: &str) -> &[InstanceId] {
        self.identity.instances_of(entity)
    }

    /// Loader registered for an unloaded attribute
    pub fn loader(&self, id: InstanceId, attribute: &str) -> Option<&PendingLoader> {
        self.loaders.get(&(id, attribute.to_string()))
    }

    /// Siblings eligible for one batch fetch of `attribute`: persistent,
    /// not expired, attribute unloaded
    pub fn batch_scope(&self, entity: &str, attribute: &str) -> Vec<(InstanceId, PrimaryKey)> {
        self.instances_of(entity)
            .iter()
            .filter_map(|&id| {
                let state = &self.instances[id.index()];
                if state.is_expired() || state.is_loaded(attribute) {
                    return None;
                }
                state.key().map(|key| (id, key.clone()))
            })
            .collect()
    }

    pub(crate) fn mark_errored(&mut self, id: InstanceId, attribute: &str) {
        if let Some(state) = self.instances.get_mut(id.index()) {
            state.mark_errored(attribute);
        }
    }

    /// Expire a whole instance: every non-key attribute becomes unloaded and
    /// local modifications are discarded. The next touch refreshes it.
    pub fn expire(&mut self, id: InstanceId) -> LoadResult<()> {
        self.instance_mut(id)?.expire();
        self.loaders.retain(|(owner, _), _| *owner != id);
        Ok(())
    }

    pub fn expire_all(&mut self) {
        for state in &mut self.instances {
            if state.is_persistent() {
                state.expire();
            }
        }

        let instances = &self.instances;
        self.loaders
            .retain(|(owner, _), _| !instances[owner.index()].is_expired());
    }

    /// Drop every instance; outstanding `InstanceId`s become invalid
    pub fn clear(&mut self) {
        self.instances.clear();
        self.identity.clear();
        self.loaders.clear();
    }
}

fn row_key(entity: &EntityType, row: &Row) -> LoadResult<PrimaryKey> {
    let mut values = Vec::with_capacity(entity.primary_key().len());
    for column in entity.primary_key() {
        let value = row.get(column).ok_or_else(|| {
            LoadError::schema(format!(
                "Row for '{}' lacks primary key column '{}'",
                entity.name(),
                column
            ))
        })?;
        values.push(value);
    }

    PrimaryKey::from_values(values).ok_or_else(|| {
        LoadError::schema(format!(
            "Row for '{}' has an unusable primary key",
            entity.name()
        ))
    })
}

fn check_shape(descriptor: &AttributeDescriptor, value: &AttributeValue) -> LoadResult<()> {
    let fits = matches!(
        (descriptor.kind(), value),
        (AttributeKind::Scalar, AttributeValue::Scalar(_))
            | (AttributeKind::ToOne, AttributeValue::One(_))
            | (AttributeKind::ToMany, AttributeValue::Many(_))
            | (AttributeKind::Keyed, AttributeValue::Many(_))
            | (AttributeKind::Keyed, AttributeValue::Keyed(_))
    );

    if fits {
        Ok(())
    } else {
        Err(LoadError::schema(format!(
            "Value does not fit {:?} attribute '{}.{}'",
            descriptor.kind(),
            descriptor.owner(),
            descriptor.name()
        )))
    }
}

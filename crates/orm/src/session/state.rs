//! Per-instance state held by a session

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::loading::plan::LoadNode;
use crate::model::{AttributeKind, EntityType, KeyValue, PrimaryKey, Value};

/// Non-owning handle to an instance held by a `Session`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(usize);

impl InstanceId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether an instance has a stable identity in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Created locally, no primary key yet
    Pending,
    /// Loaded from the store with a primary key
    Persistent,
}

/// Load state of one attribute of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Unloaded,
    Loaded,
    /// The last touch failed; the attribute is still unloaded
    Errored,
}

/// Value of an attribute as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Scalar(Value),
    One(Option<InstanceId>),
    Many(Vec<InstanceId>),
    Keyed(BTreeMap<KeyValue, InstanceId>),
}

impl AttributeValue {
    /// Value of an attribute that has nothing to load
    pub fn empty_for(kind: AttributeKind) -> Self {
        match kind {
            AttributeKind::Scalar => AttributeValue::Scalar(Value::Null),
            AttributeKind::ToOne => AttributeValue::One(None),
            AttributeKind::ToMany => AttributeValue::Many(Vec::new()),
            AttributeKind::Keyed => AttributeValue::Keyed(BTreeMap::new()),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            AttributeValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_one(&self) -> Option<Option<InstanceId>> {
        match self {
            AttributeValue::One(related) => Some(*related),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&[InstanceId]> {
        match self {
            AttributeValue::Many(related) => Some(related),
            _ => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&BTreeMap<KeyValue, InstanceId>> {
        match self {
            AttributeValue::Keyed(related) => Some(related),
            _ => None,
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        AttributeValue::Scalar(value)
    }
}

/// One instance: committed values, local modifications and load bookkeeping.
///
/// An attribute is unloaded exactly when it has no committed value.
#[derive(Debug, Clone)]
pub struct InstanceState {
    entity: Arc<EntityType>,
    lifecycle: Lifecycle,
    key: Option<PrimaryKey>,
    committed: HashMap<String, AttributeValue>,
    modified: HashMap<String, AttributeValue>,
    errored: HashSet<String>,
    expired: bool,
    node: Option<Arc<LoadNode>>,
}

impl InstanceState {
    pub(crate) fn pending(entity: Arc<EntityType>) -> Self {
        Self {
            entity,
            lifecycle: Lifecycle::Pending,
            key: None,
            committed: HashMap::new(),
            modified: HashMap::new(),
            errored: HashSet::new(),
            expired: false,
            node: None,
        }
    }

    pub(crate) fn persistent(
        entity: Arc<EntityType>,
        key: PrimaryKey,
        node: Arc<LoadNode>,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::Persistent,
            key: Some(key),
            node: Some(node),
            ..Self::pending(entity)
        }
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_persistent(&self) -> bool {
        self.lifecycle == Lifecycle::Persistent
    }

    pub fn key(&self) -> Option<&PrimaryKey> {
        self.key.as_ref()
    }

    /// Whether the whole instance was expired and awaits a refresh
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Plan node the instance was materialized through
    pub fn node(&self) -> Option<&Arc<LoadNode>> {
        self.node.as_ref()
    }

    pub fn is_loaded(&self, attribute: &str) -> bool {
        self.committed.contains_key(attribute)
    }

    pub fn is_modified(&self, attribute: &str) -> bool {
        self.modified.contains_key(attribute)
    }

    pub fn load_state(&self, attribute: &str) -> LoadState {
        if self.committed.contains_key(attribute) {
            LoadState::Loaded
        } else if self.errored.contains(attribute) {
            LoadState::Errored
        } else {
            LoadState::Unloaded
        }
    }

    /// Baseline value loaded from the store
    pub fn committed(&self, attribute: &str) -> Option<&AttributeValue> {
        self.committed.get(attribute)
    }

    /// Uncommitted local modification
    pub fn modified(&self, attribute: &str) -> Option<&AttributeValue> {
        self.modified.get(attribute)
    }

    /// Write a committed value unless one is already present
    pub(crate) fn commit_if_unloaded(&mut self, attribute: &str, value: AttributeValue) -> bool {
        if self.committed.contains_key(attribute) {
            return false;
        }

        self.errored.remove(attribute);
        self.committed.insert(attribute.to_string(), value);
        true
    }

    pub(crate) fn modify(&mut self, attribute: &str, value: AttributeValue) {
        self.modified.insert(attribute.to_string(), value);
    }

    pub(crate) fn mark_errored(&mut self, attribute: &str) {
        if !self.committed.contains_key(attribute) {
            self.errored.insert(attribute.to_string());
        }
    }

    /// Drop every non-key committed value and all local modifications
    pub(crate) fn expire(&mut self) {
        let entity = self.entity.clone();
        self.committed.retain(|name, _| entity.is_primary_key(name));
        self.modified.clear();
        self.errored.clear();
        self.expired = true;
    }

    pub(crate) fn clear_expired(&mut self) {
        self.expired = false;
    }
}

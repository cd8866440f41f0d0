use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::error::{LoadError, LoadResult};
use crate::loading::plan::LoadNode;
use crate::model::{EntityType, PrimaryKey};
use crate::session::{AttributeValue, InstanceId, Session};
use crate::store::Store;

#[cfg(test)]
mod tests;

/// Result of a batch load operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchLoadResult {
    /// Number of store queries executed
    pub query_count: usize,
    /// Number of instances that received a committed value
    pub record_count: usize,
}

/// Chunked loader: one store query per chunk of primary keys
#[derive(Debug, Clone)]
pub struct BatchLoader {
    chunk_size: usize,
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::from_config(&LoaderConfig::default())
    }
}

impl BatchLoader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(*config.get_chunk_size())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Load `attribute` for the instances with the given keys.
    ///
    /// Keys are split into order-preserving chunks. Each chunk is written into
    /// the session before the next one is fetched, so when a chunk fails the
    /// earlier ones stay loaded and the later ones stay unloaded.
    /// Relationships materialize their related rows through `nested`, or the
    /// related entity's defaults when none is given.
    pub fn load(
        &self,
        session: &mut Session,
        store: &mut dyn Store,
        entity: &Arc<EntityType>,
        keys: &[PrimaryKey],
        attribute: &str,
        nested: Option<&Arc<LoadNode>>,
    ) -> LoadResult<BatchLoadResult> {
        let descriptor = entity.require(attribute)?;
        let mut result = BatchLoadResult::default();
        if keys.is_empty() {
            return Ok(result);
        }

        let nested = match (descriptor.is_relationship(), nested) {
            (false, _) => None,
            (true, Some(node)) => Some(node.clone()),
            (true, None) => {
                let related = session.schema().related(descriptor)?;
                Some(Arc::new(LoadNode::new(related)))
            }
        };

        for chunk in keys.chunks(self.chunk_size) {
            result.query_count += 1;
            match &nested {
                None => {
                    let values = store.fetch_column_values(entity, chunk, attribute)?;
                    for (key, value) in values {
                        let id = match session.find(entity.name(), &key) {
                            Some(id) => id,
                            None => continue,
                        };
                        if session.set_committed(id, attribute, AttributeValue::Scalar(value))? {
                            result.record_count += 1;
                        }
                    }
                }
                Some(node) => {
                    let before = loaded_count(session, entity, chunk, attribute);
                    store.fetch_and_merge_relationship(session, entity, chunk, attribute, node)?;
                    result.record_count += loaded_count(session, entity, chunk, attribute) - before;
                }
            }
        }

        tracing::trace!(
            entity = entity.name(),
            attribute,
            queries = result.query_count,
            records = result.record_count,
            "Batch load finished"
        );
        Ok(result)
    }
}

fn loaded_count(
    session: &Session,
    entity: &EntityType,
    keys: &[PrimaryKey],
    attribute: &str,
) -> usize {
    keys.iter()
        .filter_map(|key| session.find(entity.name(), key))
        .filter(|&id| session.is_loaded(id, attribute))
        .count()
}

/// Load one attribute for an explicit list of instances in chunks.
///
/// Instances that already have the attribute loaded are skipped; pending
/// instances are rejected since they have no key to fetch by.
pub fn bulk_load_attribute(
    session: &mut Session,
    store: &mut dyn Store,
    entity: &str,
    instances: &[InstanceId],
    attribute: &str,
) -> LoadResult<BatchLoadResult> {
    let entity = session.schema().entity(entity)?;
    entity.require(attribute)?;

    let mut keys = Vec::with_capacity(instances.len());
    for &id in instances {
        let state = session.instance(id)?;
        if state.entity().name() != entity.name() {
            return Err(LoadError::schema(format!(
                "Instance {} is a '{}', not a '{}'",
                id,
                state.entity().name(),
                entity.name()
            )));
        }
        if !state.is_loaded(attribute) {
            keys.push(session.key(id)?.clone());
        }
    }

    BatchLoader::from_config(session.config()).load(session, store, &entity, &keys, attribute, None)
}

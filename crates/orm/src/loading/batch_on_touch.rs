//! Batch-on-touch: the first touch of an unloaded attribute loads it for every
//! eligible sibling held by the same session

use std::sync::Arc;

use crate::error::{LoadError, LoadResult};
use crate::model::AttributeDescriptor;
use crate::session::{AttributeValue, InstanceId, Session};
use crate::store::Store;

use super::batch_loader::BatchLoader;
use super::plan::LoadNode;
use super::strategy::BatchOptions;

/// Load `attribute` for the whole batch scope of `id`, then return its value.
///
/// `node` is the plan node the touched instance was materialized through.
pub(crate) fn load(
    session: &mut Session,
    store: &mut dyn Store,
    id: InstanceId,
    attribute: &str,
    node: &Arc<LoadNode>,
    options: BatchOptions,
) -> LoadResult<AttributeValue> {
    let entity = session.instance(id)?.entity().clone();
    let descriptor = entity.require(attribute)?.clone();

    let scope = session.batch_scope(entity.name(), attribute);
    if !scope.is_empty() {
        if *session.config().get_log_batches() {
            tracing::warn!(
                target: "elif_batchload::batch_on_touch",
                entity = entity.name(),
                attribute,
                count = scope.len(),
                "{}.{}: N+1 loading of {} instances",
                entity.name(),
                attribute,
                scope.len()
            );
        }

        let nested = if descriptor.is_relationship() {
            Some(nested_plan(session, node, &descriptor, options)?)
        } else {
            None
        };
        let keys: Vec<_> = scope.into_iter().map(|(_, key)| key).collect();

        BatchLoader::from_config(session.config()).load(
            session,
            store,
            &entity,
            &keys,
            attribute,
            nested.as_ref(),
        )?;
    }

    loaded_value(session, id, attribute)
}

/// Plan for the instances reached through a batch-loaded relationship
fn nested_plan(
    session: &Session,
    node: &LoadNode,
    descriptor: &AttributeDescriptor,
    options: BatchOptions,
) -> LoadResult<Arc<LoadNode>> {
    let related = session.schema().related(descriptor)?;
    if options.nested {
        return Ok(Arc::new(LoadNode::batch_defaults(related, options)));
    }

    Ok(node
        .child(descriptor.name())
        .cloned()
        .unwrap_or_else(|| Arc::new(LoadNode::new(related))))
}

/// Committed value after a load; a missing one means the row is gone
pub(crate) fn loaded_value(
    session: &Session,
    id: InstanceId,
    attribute: &str,
) -> LoadResult<AttributeValue> {
    if let Some(value) = session.committed_value(id, attribute) {
        return Ok(value.clone());
    }

    let state = session.instance(id)?;
    Err(LoadError::ObjectDeleted {
        entity: state.entity().name().to_string(),
        key: session.key(id)?.clone(),
    })
}

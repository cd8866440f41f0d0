//! Plain lazy loading, one instance at a time, and refresh of expired instances

use std::sync::Arc;

use crate::error::LoadResult;
use crate::session::{AttributeValue, InstanceId, Session};
use crate::store::Store;

use super::batch_loader::BatchLoader;
use super::batch_on_touch::loaded_value;
use super::plan::LoadNode;

/// Load `attribute` for the touched instance only
pub(crate) fn load_one(
    session: &mut Session,
    store: &mut dyn Store,
    id: InstanceId,
    attribute: &str,
    node: &Arc<LoadNode>,
) -> LoadResult<AttributeValue> {
    let entity = session.instance(id)?.entity().clone();
    let key = session.key(id)?.clone();
    tracing::debug!(entity = entity.name(), attribute, key = %key, "Lazy loading attribute");

    let child = node.child(attribute).cloned();
    BatchLoader::new(1).load(session, store, &entity, &[key], attribute, child.as_ref())?;

    loaded_value(session, id, attribute)
}

/// Re-read an expired instance from the store
pub(crate) fn refresh_expired(
    session: &mut Session,
    store: &mut dyn Store,
    id: InstanceId,
) -> LoadResult<()> {
    let entity = session.instance(id)?.entity().clone();
    let key = session.key(id)?.clone();
    tracing::debug!(entity = entity.name(), key = %key, "Refreshing expired instance");

    store.refresh(session, &entity, &key)?;
    Ok(())
}

//! Raise-on-touch: unloaded attributes must not be loaded implicitly

use crate::error::{LoadError, LoadResult};
use crate::session::{AttributeValue, InstanceId, Session};

/// Refuse the load. The attribute stays unloaded and its loader registered,
/// so every later touch fails the same way.
pub(crate) fn raise(
    session: &Session,
    id: InstanceId,
    attribute: &str,
) -> LoadResult<AttributeValue> {
    let entity = session.instance(id)?.entity().name().to_string();
    tracing::debug!(entity = %entity, attribute, "Touched raise-on-touch attribute");
    Err(LoadError::lazy_load_forbidden(&entity, attribute))
}

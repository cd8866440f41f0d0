//! Store contract - the only way the loading engine reaches persisted rows
//!
//! Implementations run the fetch queries and merge relationship rows back
//! through the session, so related instances keep their identity.

pub mod memory;

use std::sync::Arc;

use crate::error::StoreResult;
use crate::loading::plan::LoadNode;
use crate::model::{EntityType, PrimaryKey, Value};
use crate::session::{InstanceId, Session};

pub use memory::{MemoryStore, QueryLog};

/// Synchronous store used by sessions, queries and loaders
pub trait Store {
    /// `(primary key, value)` for one scalar column of the rows in `keys`.
    /// Keys without a row are left out.
    fn fetch_column_values(
        &mut self,
        entity: &EntityType,
        keys: &[PrimaryKey],
        attribute: &str,
    ) -> StoreResult<Vec<(PrimaryKey, Value)>>;

    /// Load `relationship` for the rows in `keys` and write it into the
    /// session. Related rows are materialized through `nested`; every owner
    /// in `keys` held by the session gets a committed value, empty when it
    /// has no related rows.
    fn fetch_and_merge_relationship(
        &mut self,
        session: &mut Session,
        entity: &EntityType,
        keys: &[PrimaryKey],
        relationship: &str,
        nested: &Arc<LoadNode>,
    ) -> StoreResult<()>;

    /// Initial query: every row of the plan's root entity, materialized through `plan`
    fn select(
        &mut self,
        session: &mut Session,
        plan: &Arc<LoadNode>,
    ) -> StoreResult<Vec<InstanceId>>;

    /// Re-read an expired instance's row
    fn refresh(
        &mut self,
        session: &mut Session,
        entity: &EntityType,
        key: &PrimaryKey,
    ) -> StoreResult<()>;
}

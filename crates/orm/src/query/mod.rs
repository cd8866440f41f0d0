//! Query Module - initial selects with per-query loading declarations
//!
//! - `fetch`: the statements a store runs
//! - `sql_generation`: SQL rendering of those statements

pub mod fetch;
pub mod sql_generation;

use std::sync::Arc;

use crate::error::LoadResult;
use crate::loading::options::Load;
use crate::loading::plan::LoadPlan;
use crate::loading::rewriter;
use crate::model::Schema;
use crate::session::{InstanceId, Session};
use crate::store::Store;

pub use fetch::{FetchQuery, Join, Projection};

/// Select every instance of one entity type, with loading declarations
#[derive(Debug, Clone)]
pub struct Query {
    plan: LoadPlan,
}

impl Query {
    pub fn new(schema: &Arc<Schema>, entity: &str) -> LoadResult<Self> {
        Ok(Self {
            plan: LoadPlan::new(schema.clone(), entity)?,
        })
    }

    /// Attach loading declarations; unknown attributes and paths fail here
    pub fn options(mut self, load: Load) -> LoadResult<Self> {
        self.plan.apply(&load)?;
        Ok(self)
    }

    /// Apply others propagation now instead of at execution
    pub fn rewrite_others(mut self) -> Self {
        self.plan = rewriter::rewrite(&self.plan);
        self
    }

    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    /// Plan used for execution: rewritten when a declaration asks for others propagation
    pub fn execution_plan(&self) -> LoadPlan {
        if self.plan.wants_others() {
            rewriter::rewrite(&self.plan)
        } else {
            self.plan.clone()
        }
    }

    /// Run the query and return the instances in store order
    pub fn all(&self, session: &mut Session, store: &mut dyn Store) -> LoadResult<Vec<InstanceId>> {
        let plan = self.execution_plan();
        tracing::debug!(
            entity = plan.root().entity().name(),
            paths = plan.paths().len(),
            "Executing query"
        );

        Ok(store.select(session, plan.root())?)
    }

    pub fn first(
        &self,
        session: &mut Session,
        store: &mut dyn Store,
    ) -> LoadResult<Option<InstanceId>> {
        Ok(self.all(session, store)?.into_iter().next())
    }
}

//! Attribute loading for the elif batch loader
//!
//! - `strategy`: loading strategies and batch options
//! - `options`: chainable loading declarations
//! - `plan`: declarations resolved into a trie of relationship paths
//! - `batch_loader`: chunked fetching through a store
//! - `batch_on_touch`, `raise_on_touch`, `lazy`: what happens on first touch
//! - `rewriter`: others propagation over declared paths

pub mod batch_loader;
pub mod batch_on_touch;
pub mod lazy;
pub mod options;
pub mod plan;
pub mod raise_on_touch;
pub mod rewriter;
pub mod strategy;

use std::sync::Arc;

use crate::error::LoadResult;
use crate::session::{AttributeValue, InstanceId, PendingLoader, Session};
use crate::store::Store;

pub use batch_loader::{bulk_load_attribute, BatchLoadResult, BatchLoader};
pub use options::{Directive, Load, Names, Target};
pub use plan::{LoadNode, LoadPlan};
pub use rewriter::rewrite;
pub use strategy::{BatchOptions, LoadingStrategy};

/// Run the loader governing an unloaded attribute.
///
/// A failed touch marks the attribute errored; its loader stays registered
/// and the next touch tries again.
pub(crate) fn load_attribute(
    session: &mut Session,
    store: &mut dyn Store,
    id: InstanceId,
    attribute: &str,
) -> LoadResult<AttributeValue> {
    let result = dispatch(session, store, id, attribute);
    if result.is_err() {
        session.mark_errored(id, attribute);
    }
    result
}

fn dispatch(
    session: &mut Session,
    store: &mut dyn Store,
    id: InstanceId,
    attribute: &str,
) -> LoadResult<AttributeValue> {
    if session.instance(id)?.is_expired() {
        lazy::refresh_expired(session, store, id)?;
        if let Some(value) = session.committed_value(id, attribute) {
            return Ok(value.clone());
        }
    }

    let state = session.instance(id)?;
    let descriptor = state.entity().require(attribute)?;

    // Pending instances have nothing to load from
    if !state.is_persistent() {
        return Ok(AttributeValue::empty_for(descriptor.kind()));
    }

    let loader = match session.loader(id, attribute) {
        Some(loader) => loader.clone(),
        None => PendingLoader {
            strategy: LoadingStrategy::Deferred,
            node: state
                .node()
                .cloned()
                .unwrap_or_else(|| Arc::new(LoadNode::new(state.entity().clone()))),
        },
    };

    match loader.strategy {
        LoadingStrategy::RaiseOnTouch => raise_on_touch::raise(session, id, attribute),
        LoadingStrategy::BatchOnTouch(options) => {
            batch_on_touch::load(session, store, id, attribute, &loader.node, options)
        }
        LoadingStrategy::Deferred | LoadingStrategy::Eager => {
            if session.is_safeguarded() {
                let options = BatchOptions::default();
                batch_on_touch::load(session, store, id, attribute, &loader.node, options)
            } else {
                lazy::load_one(session, store, id, attribute, &loader.node)
            }
        }
    }
}

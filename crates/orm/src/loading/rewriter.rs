//! Others propagation: retrofit batch-on-touch onto relationship paths
//! declared by other directives of the same query
//!
//! Every node reached through a relationship gets `default_columns()` plus
//! `batch_on_touch("*")` appended. Explicit declarations for relationships
//! on those nodes keep precedence over the appended wildcard, so paths such
//! as `joined("number")` stay eager while everything below them batches.

use super::plan::{LoadNode, LoadPlan};
use super::strategy::BatchOptions;

/// Rewritten copy of `plan`; nodes rewritten before are left as they are
pub fn rewrite(plan: &LoadPlan) -> LoadPlan {
    let mut plan = plan.clone();
    for child in plan.root_mut().children_mut() {
        rewrite_node(child);
    }
    plan
}

fn rewrite_node(node: &mut LoadNode) {
    if !node.is_rewritten() {
        node.apply_batch_defaults(BatchOptions::default());
        node.mark_rewritten();
    }

    for child in node.children_mut() {
        rewrite_node(child);
    }
}

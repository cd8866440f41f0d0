//! Loading strategies attached to attributes by query declarations

use serde::{Deserialize, Serialize};

/// Options for the batch-on-touch strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Re-apply batch-on-touch to the attributes of instances reached through
    /// a batch-loaded relationship
    pub nested: bool,
    /// Retrofit batch-on-touch onto relationship paths declared by other
    /// directives on the same query (see `loading::rewriter`)
    pub others: bool,
}

impl BatchOptions {
    /// Options with nested propagation enabled
    pub fn nested() -> Self {
        Self {
            nested: true,
            others: false,
        }
    }

    /// Options with others propagation enabled
    pub fn others() -> Self {
        Self {
            nested: false,
            others: true,
        }
    }

    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    pub fn with_others(mut self, others: bool) -> Self {
        self.others = others;
        self
    }
}

/// How an attribute gets its value for the instances of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingStrategy {
    /// Loaded by the query that materializes the instance
    Eager,
    /// Loaded on first touch, one instance at a time
    Deferred,
    /// Loaded on first touch for every eligible sibling in the session
    BatchOnTouch(BatchOptions),
    /// Touching the unloaded attribute is an error
    RaiseOnTouch,
}

impl LoadingStrategy {
    /// Batch-on-touch with default options
    pub fn batch() -> Self {
        LoadingStrategy::BatchOnTouch(BatchOptions::default())
    }

    /// Whether the value comes with the materializing query
    pub fn is_eager(&self) -> bool {
        matches!(self, LoadingStrategy::Eager)
    }

    /// Batch options, if this is a batch-on-touch strategy
    pub fn batch_options(&self) -> Option<BatchOptions> {
        match self {
            LoadingStrategy::BatchOnTouch(options) => Some(*options),
            _ => None,
        }
    }
}

impl Default for LoadingStrategy {
    fn default() -> Self {
        LoadingStrategy::Eager
    }
}

impl std::fmt::Display for LoadingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadingStrategy::Eager => write!(f, "eager"),
            LoadingStrategy::Deferred => write!(f, "deferred"),
            LoadingStrategy::BatchOnTouch(options) => {
                write!(f, "batch_on_touch(nested={}, others={})", options.nested, options.others)
            }
            LoadingStrategy::RaiseOnTouch => write!(f, "raise_on_touch"),
        }
    }
}

//! Loader options - chainable declarations of per-attribute loading strategies
//!
//! A `Load` is an ordered list of directives, each bound to a relationship
//! path from the query root. `joined` and `then` move the cursor down a
//! relationship so later directives in the chain apply to the related entity:
//!
//! ```ignore
//! let load = joined("number")
//!     .default_columns()
//!     .batch_on_touch(["*"], BatchOptions::default());
//! ```
//!
//! Names are checked against the schema when the chain is applied to a query.

use super::strategy::{BatchOptions, LoadingStrategy};

/// Attribute names a directive targets; `"*"` selects every attribute of the target kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Names {
    All,
    Only(Vec<String>),
}

impl Names {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut only = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name == "*" {
                return Names::All;
            }
            only.push(name.to_string());
        }
        Names::Only(only)
    }
}

/// Kind of attributes a directive applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Columns,
    Relationships,
    Attributes,
}

/// A single loading declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Every non-key scalar follows its descriptor default, overriding earlier wildcards
    DefaultColumns,
    /// Assign a strategy to the named attributes
    Strategy {
        target: Target,
        names: Names,
        strategy: LoadingStrategy,
    },
    /// Load only these scalars (and the primary key); defer the others
    LoadOnly(Vec<String>),
}

/// Chain of directives with a relationship-path cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Load {
    cursor: Vec<String>,
    entries: Vec<(Vec<String>, Directive)>,
}

impl Load {
    /// Empty chain positioned at the query root
    pub fn root() -> Self {
        Self::default()
    }

    /// Empty chain positioned at the end of `path`
    pub fn path<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            cursor: path.into_iter().map(|s| s.as_ref().to_string()).collect(),
            entries: Vec::new(),
        }
    }

    /// Move the cursor one relationship further
    pub fn then(mut self, relationship: &str) -> Self {
        self.cursor.push(relationship.to_string());
        self
    }

    /// Load `relationship` together with its owner, then move the cursor onto it
    pub fn joined(self, relationship: &str) -> Self {
        self.eager(relationship).then(relationship)
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.entries.push((self.cursor.clone(), directive));
        self
    }

    pub fn default_columns(self) -> Self {
        self.directive(Directive::DefaultColumns)
    }

    fn strategy<I, S>(self, target: Target, names: I, strategy: LoadingStrategy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.directive(Directive::Strategy {
            target,
            names: Names::from_names(names),
            strategy,
        })
    }

    /// Batch-on-touch for the named attributes of any kind
    pub fn batch_on_touch<I, S>(self, names: I, options: BatchOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Attributes, names, LoadingStrategy::BatchOnTouch(options))
    }

    pub fn batch_on_touch_columns<I, S>(self, names: I, options: BatchOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Columns, names, LoadingStrategy::BatchOnTouch(options))
    }

    pub fn batch_on_touch_relationships<I, S>(self, names: I, options: BatchOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Relationships, names, LoadingStrategy::BatchOnTouch(options))
    }

    /// Forbid touching the named attributes while they are unloaded
    pub fn raise_on_touch<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Attributes, names, LoadingStrategy::RaiseOnTouch)
    }

    pub fn raise_on_touch_columns<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Columns, names, LoadingStrategy::RaiseOnTouch)
    }

    pub fn raise_on_touch_relationships<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Relationships, names, LoadingStrategy::RaiseOnTouch)
    }

    pub fn load_only<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = columns.into_iter().map(|c| c.as_ref().to_string()).collect();
        self.directive(Directive::LoadOnly(columns))
    }

    /// Plain lazy loading for the named scalars
    pub fn defer<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Columns, columns, LoadingStrategy::Deferred)
    }

    /// Load the named scalars with their instance
    pub fn undefer<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strategy(Target::Columns, columns, LoadingStrategy::Eager)
    }

    /// Load a relationship together with its owner
    pub fn eager(self, relationship: &str) -> Self {
        self.relationship_strategy(relationship, LoadingStrategy::Eager)
    }

    /// Plain lazy loading for a relationship
    pub fn lazy(self, relationship: &str) -> Self {
        self.relationship_strategy(relationship, LoadingStrategy::Deferred)
    }

    pub fn relationship_strategy(self, relationship: &str, strategy: LoadingStrategy) -> Self {
        self.strategy(Target::Relationships, [relationship], strategy)
    }

    /// Directives with the path each one applies to, in declaration order
    pub fn entries(&self) -> &[(Vec<String>, Directive)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn default_columns() -> Load {
    Load::root().default_columns()
}

pub fn batch_on_touch<I, S>(names: I, options: BatchOptions) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().batch_on_touch(names, options)
}

pub fn batch_on_touch_columns<I, S>(names: I, options: BatchOptions) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().batch_on_touch_columns(names, options)
}

pub fn batch_on_touch_relationships<I, S>(names: I, options: BatchOptions) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().batch_on_touch_relationships(names, options)
}

pub fn raise_on_touch<I, S>(names: I) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().raise_on_touch(names)
}

pub fn raise_on_touch_columns<I, S>(names: I) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().raise_on_touch_columns(names)
}

pub fn raise_on_touch_relationships<I, S>(names: I) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().raise_on_touch_relationships(names)
}

pub fn load_only<I, S>(columns: I) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().load_only(columns)
}

pub fn defer<I, S>(columns: I) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().defer(columns)
}

pub fn undefer<I, S>(columns: I) -> Load
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Load::root().undefer(columns)
}

pub fn eager(relationship: &str) -> Load {
    Load::root().eager(relationship)
}

pub fn lazy(relationship: &str) -> Load {
    Load::root().lazy(relationship)
}

pub fn joined(relationship: &str) -> Load {
    Load::root().joined(relationship)
}

pub fn relationship_strategy(relationship: &str, strategy: LoadingStrategy) -> Load {
    Load::root().relationship_strategy(relationship, strategy)
}

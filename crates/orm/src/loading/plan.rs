//! Load plans - the declared loading strategies of a query, as a trie of
//! relationship paths
//!
//! Every node describes one entity type reached from the query root through a
//! path of relationship names. Instances materialized through a node keep a
//! shared handle to it, so loaders registered on them can look up the
//! strategies declared for their children later on.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::LoadResult;
use crate::model::{AttributeDescriptor, EntityType, Schema};

use super::options::{Directive, Load, Names, Target};
use super::strategy::{BatchOptions, LoadingStrategy};

/// One node of a load plan
#[derive(Debug, Clone)]
pub struct LoadNode {
    entity: Arc<EntityType>,
    explicit: HashMap<String, LoadingStrategy>,
    column_wildcard: Option<LoadingStrategy>,
    relationship_wildcard: Option<LoadingStrategy>,
    children: BTreeMap<String, Arc<LoadNode>>,
    rewritten: bool,
}

impl LoadNode {
    /// A node with no declarations: every attribute follows its descriptor default
    pub fn new(entity: Arc<EntityType>) -> Self {
        Self {
            entity,
            explicit: HashMap::new(),
            column_wildcard: None,
            relationship_wildcard: None,
            children: BTreeMap::new(),
            rewritten: false,
        }
    }

    /// `default_columns() + batch_on_touch("*", options)` on a fresh node
    pub fn batch_defaults(entity: Arc<EntityType>, options: BatchOptions) -> Self {
        let mut node = Self::new(entity);
        node.apply_batch_defaults(options);
        node
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    /// Effective strategy of an attribute on this node.
    ///
    /// Primary-key attributes are always eager. Otherwise the explicit
    /// declaration wins, then the wildcard for the attribute's kind, then the
    /// descriptor default. `None` for names the entity type does not have.
    pub fn strategy_for(&self, attribute: &str) -> Option<LoadingStrategy> {
        let descriptor = self.entity.attribute(attribute)?;
        Some(self.resolve(descriptor))
    }

    fn resolve(&self, descriptor: &AttributeDescriptor) -> LoadingStrategy {
        if descriptor.is_primary_key() {
            return LoadingStrategy::Eager;
        }

        if let Some(strategy) = self.explicit.get(descriptor.name()) {
            return *strategy;
        }

        let wildcard = if descriptor.is_scalar() {
            self.column_wildcard
        } else {
            self.relationship_wildcard
        };

        wildcard.unwrap_or_else(|| descriptor.default_strategy())
    }

    /// Scalar attributes loaded by the query that materializes instances of this node
    pub fn loaded_columns(&self) -> Vec<&str> {
        self.entity
            .columns()
            .filter(|descriptor| self.resolve(descriptor).is_eager())
            .map(|descriptor| descriptor.name())
            .collect()
    }

    /// Relationships loaded together with the instances of this node
    pub fn eager_relationships(&self) -> Vec<&AttributeDescriptor> {
        self.entity
            .relationships()
            .filter(|descriptor| self.resolve(descriptor).is_eager())
            .collect()
    }

    /// Declarations scoped to the entities reached through `relationship`
    pub fn child(&self, relationship: &str) -> Option<&Arc<LoadNode>> {
        self.children.get(relationship)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Arc<LoadNode>)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Whether the others-propagation rewrite already ran on this node
    pub fn is_rewritten(&self) -> bool {
        self.rewritten
    }

    /// Whether any batch-on-touch declaration in this subtree asks for others propagation
    pub fn wants_others(&self) -> bool {
        let declared = self
            .explicit
            .values()
            .chain(self.column_wildcard.iter())
            .chain(self.relationship_wildcard.iter())
            .any(|strategy| strategy.batch_options().map_or(false, |options| options.others));

        declared || self.children.values().any(|child| child.wants_others())
    }

    /// All declared relationship paths below this node, depth first
    pub fn paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        for (name, child) in &self.children {
            paths.push(vec![name.clone()]);
            for mut sub in child.paths() {
                sub.insert(0, name.clone());
                paths.push(sub);
            }
        }
        paths
    }

    /// Node at the end of a relationship path, creating missing nodes
    pub(crate) fn descend(
        &mut self,
        schema: &Schema,
        relationship: &str,
    ) -> LoadResult<&mut LoadNode> {
        let descriptor = self.entity.require_relationship(relationship)?;
        let related = schema.related(descriptor)?;
        let child = self
            .children
            .entry(relationship.to_string())
            .or_insert_with(|| Arc::new(LoadNode::new(related)));
        Ok(Arc::make_mut(child))
    }

    pub(crate) fn descend_path(
        &mut self,
        schema: &Schema,
        path: &[String],
    ) -> LoadResult<&mut LoadNode> {
        let mut node = self;
        for segment in path {
            node = node.descend(schema, segment)?;
        }
        Ok(node)
    }

    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = &mut LoadNode> {
        self.children.values_mut().map(Arc::make_mut)
    }

    pub(crate) fn mark_rewritten(&mut self) {
        self.rewritten = true;
    }

    /// Seed an explicit strategy for every non-key scalar from its descriptor default
    pub(crate) fn apply_default_columns(&mut self) {
        for descriptor in self.entity.columns() {
            if !descriptor.is_primary_key() {
                self.explicit
                    .insert(descriptor.name().to_string(), descriptor.default_strategy());
            }
        }
    }

    pub(crate) fn apply_batch_defaults(&mut self, options: BatchOptions) {
        self.apply_default_columns();
        self.column_wildcard = Some(LoadingStrategy::BatchOnTouch(options));
        self.relationship_wildcard = Some(LoadingStrategy::BatchOnTouch(options));
    }

    /// Apply one directive to this node.
    ///
    /// Names are validated before anything is changed, so a failing directive
    /// leaves the node untouched.
    pub(crate) fn apply(&mut self, schema: &Schema, directive: &Directive) -> LoadResult<()> {
        match directive {
            Directive::DefaultColumns => self.apply_default_columns(),
            Directive::Strategy { target, names, strategy } => match names {
                Names::All => {
                    if matches!(target, Target::Columns | Target::Attributes) {
                        self.column_wildcard = Some(*strategy);
                    }
                    if matches!(target, Target::Relationships | Target::Attributes) {
                        self.relationship_wildcard = Some(*strategy);
                    }
                }
                Names::Only(list) => {
                    let entity = self.entity.clone();
                    let mut relationships = Vec::new();
                    for name in list {
                        let descriptor = match target {
                            Target::Columns => entity.require_column(name)?,
                            Target::Relationships => entity.require_relationship(name)?,
                            Target::Attributes => entity.require(name)?,
                        };
                        if descriptor.is_relationship() {
                            relationships.push(name);
                        }
                    }

                    // A named relationship declares a path of its own
                    for name in relationships {
                        self.descend(schema, name)?;
                    }
                    for name in list {
                        self.explicit.insert(name.clone(), *strategy);
                    }
                }
            },
            Directive::LoadOnly(columns) => {
                for name in columns {
                    self.entity.require_column(name)?;
                }
                for name in columns {
                    self.explicit.insert(name.clone(), LoadingStrategy::Eager);
                }
                self.column_wildcard = Some(LoadingStrategy::Deferred);
            }
        }

        Ok(())
    }
}

/// The complete set of loading declarations of one query
#[derive(Debug, Clone)]
pub struct LoadPlan {
    schema: Arc<Schema>,
    root: Arc<LoadNode>,
}

impl LoadPlan {
    /// An empty plan rooted at `entity`
    pub fn new(schema: Arc<Schema>, entity: &str) -> LoadResult<Self> {
        let entity = schema.entity(entity)?;
        Ok(Self {
            schema,
            root: Arc::new(LoadNode::new(entity)),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn root(&self) -> &Arc<LoadNode> {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut LoadNode {
        Arc::make_mut(&mut self.root)
    }

    /// Apply a chain of directives; fails on the first unknown attribute or path segment
    pub fn apply(&mut self, load: &Load) -> LoadResult<()> {
        let schema = self.schema.clone();
        let root = Arc::make_mut(&mut self.root);
        for (path, directive) in load.entries() {
            let node = root.descend_path(&schema, path)?;
            node.apply(&schema, directive)?;
        }
        Ok(())
    }

    /// Node at the end of a declared path, if that path was declared
    pub fn node(&self, path: &[&str]) -> Option<&Arc<LoadNode>> {
        let mut node = &self.root;
        for segment in path {
            node = node.child(segment)?;
        }
        Some(node)
    }

    pub fn paths(&self) -> Vec<Vec<String>> {
        self.root.paths()
    }

    pub fn wants_others(&self) -> bool {
        self.root.wants_others()
    }
}

//! In-memory store implementation for development and testing
//!
//! Tables are kept per entity type, ordered by primary key. Every statement
//! the store would send to a database is rendered and recorded in a
//! `QueryLog`, so tests can count round trips.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{LoadError, LoadResult, StoreError, StoreResult};
use crate::loading::plan::LoadNode;
use crate::model::{AttributeDescriptor, AttributeKind, EntityType, PrimaryKey, Row, Schema, Value};
use crate::query::fetch::{FetchQuery, Join};
use crate::session::{AttributeValue, InstanceId, Session};

use super::Store;

/// Statements issued by a store, in order
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    statements: Vec<String>,
}

impl QueryLog {
    pub fn count(&self) -> usize {
        self.statements.len()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn last(&self) -> Option<&str> {
        self.statements.last().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.statements.clear();
    }

    fn record(&mut self, sql: String) {
        self.statements.push(sql);
    }
}

/// In-memory store
#[derive(Debug)]
pub struct MemoryStore {
    schema: Arc<Schema>,
    tables: HashMap<String, BTreeMap<PrimaryKey, Row>>,
    log: QueryLog,
    fail_at: Option<usize>,
}

impl MemoryStore {
    /// Create an empty store for the entity types of `schema`
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            tables: HashMap::new(),
            log: QueryLog::default(),
            fail_at: None,
        }
    }

    /// Insert or replace a row; `row` must be a JSON object carrying the primary key
    pub fn insert(&mut self, entity: &str, row: Value) -> LoadResult<PrimaryKey> {
        let entity = self.schema.entity(entity)?;
        let row = match row {
            Value::Object(row) => row,
            other => {
                return Err(LoadError::schema(format!(
                    "Row for '{}' must be an object, got {}",
                    entity.name(),
                    other
                )))
            }
        };

        for column in row.keys() {
            entity.require_column(column)?;
        }

        let values = entity.primary_key().iter().filter_map(|column| row.get(column));
        let key = PrimaryKey::from_values(values)
            .filter(|key| key.arity() == entity.primary_key().len())
            .ok_or_else(|| {
                LoadError::schema(format!(
                    "Row for '{}' lacks a usable primary key",
                    entity.name()
                ))
            })?;

        self.tables
            .entry(entity.name().to_string())
            .or_default()
            .insert(key.clone(), row);
        Ok(key)
    }

    pub fn insert_many<I>(&mut self, entity: &str, rows: I) -> LoadResult<Vec<PrimaryKey>>
    where
        I: IntoIterator<Item = Value>,
    {
        rows.into_iter().map(|row| self.insert(entity, row)).collect()
    }

    /// Change one column of a stored row
    pub fn update(
        &mut self,
        entity: &str,
        key: &PrimaryKey,
        column: &str,
        value: Value,
    ) -> LoadResult<()> {
        self.schema.entity(entity)?.require_column(column)?;
        let row = self
            .tables
            .get_mut(entity)
            .and_then(|table| table.get_mut(key))
            .ok_or_else(|| StoreError::RowNotFound {
                entity: entity.to_string(),
                key: key.clone(),
            })?;
        row.insert(column.to_string(), value);
        Ok(())
    }

    /// Remove a stored row; returns whether it existed
    pub fn delete(&mut self, entity: &str, key: &PrimaryKey) -> bool {
        self.tables
            .get_mut(entity)
            .map_or(false, |table| table.remove(key).is_some())
    }

    pub fn row(&self, entity: &str, key: &PrimaryKey) -> Option<&Row> {
        self.tables.get(entity)?.get(key)
    }

    pub fn log(&self) -> &QueryLog {
        &self.log
    }

    pub fn reset_log(&mut self) {
        self.log.clear();
    }

    /// Make the `n`-th query from now on fail with `StoreError::Query`
    pub fn fail_on_query(&mut self, n: usize) {
        self.fail_at = Some(self.log.count() + n);
    }

    fn run(&mut self, query: &FetchQuery) -> StoreResult<()> {
        let (sql, params) = query.to_sql_with_params();
        tracing::trace!(sql = %sql, params = params.len(), "Memory store query");
        self.log.record(sql);

        if self.fail_at == Some(self.log.count()) {
            self.fail_at = None;
            return Err(StoreError::query(format!(
                "injected failure on query {}",
                self.log.count()
            )));
        }

        Ok(())
    }

    fn table(&self, entity: &str) -> impl Iterator<Item = (&PrimaryKey, &Row)> {
        self.tables.get(entity).into_iter().flat_map(|table| table.iter())
    }

    /// Rows of the related entity joined to `owner_row`, in primary key order
    fn related_rows(
        &self,
        descriptor: &AttributeDescriptor,
        owner_row: &Row,
    ) -> StoreResult<Vec<Row>> {
        let related = self.schema.related(descriptor)?;
        let pairs: Vec<(&str, &str)> = match descriptor.join() {
            Some(join) => join.pairs().collect(),
            None => return Ok(Vec::new()),
        };

        let rows = self
            .table(related.name())
            .filter(|(_, row)| {
                pairs.iter().all(|(local, remote)| match owner_row.get(*local) {
                    Some(Value::Null) | None => false,
                    Some(value) => row.get(*remote) == Some(value),
                })
            })
            .map(|(_, row)| row.clone())
            .collect();
        Ok(rows)
    }

    /// Joins rendered for the eager relationships below `node`
    fn eager_joins(&self, node: &LoadNode, owner: &str) -> StoreResult<Vec<Join>> {
        let mut joins = Vec::new();
        for descriptor in node.eager_relationships() {
            let related = self.schema.related(descriptor)?;
            let child = child_node(node, descriptor, &related);
            let columns = child.loaded_columns().into_iter().map(String::from).collect();
            joins.push(Join::new(owner, descriptor, &related, columns)?);
            joins.extend(self.eager_joins(&child, descriptor.name())?);
        }
        Ok(joins)
    }

    /// Materialize one related row set per eager relationship of `node`, recursively
    fn merge_eager(
        &self,
        session: &mut Session,
        node: &LoadNode,
        owner: InstanceId,
        owner_row: &Row,
    ) -> StoreResult<()> {
        for descriptor in node.eager_relationships() {
            let related = self.schema.related(descriptor)?;
            let child = child_node(node, descriptor, &related);
            self.merge_related(session, descriptor, &child, owner, owner_row)?;
        }
        Ok(())
    }

    fn merge_related(
        &self,
        session: &mut Session,
        descriptor: &AttributeDescriptor,
        node: &Arc<LoadNode>,
        owner: InstanceId,
        owner_row: &Row,
    ) -> StoreResult<()> {
        let columns = node.loaded_columns();
        let mut related = Vec::new();
        for row in self.related_rows(descriptor, owner_row)? {
            let id = session.materialize(node, &project(&row, &columns))?;
            self.merge_eager(session, node, id, &row)?;
            related.push(id);
        }

        let value = match descriptor.kind() {
            AttributeKind::ToOne => AttributeValue::One(related.first().copied()),
            _ => AttributeValue::Many(related),
        };
        session.set_committed(owner, descriptor.name(), value)?;
        Ok(())
    }
}

impl Store for MemoryStore {
    fn fetch_column_values(
        &mut self,
        entity: &EntityType,
        keys: &[PrimaryKey],
        attribute: &str,
    ) -> StoreResult<Vec<(PrimaryKey, Value)>> {
        self.run(&FetchQuery::column(entity, attribute, keys)?)?;

        let values = keys
            .iter()
            .filter_map(|key| {
                let row = self.row(entity.name(), key)?;
                Some((key.clone(), row.get(attribute).cloned().unwrap_or(Value::Null)))
            })
            .collect();
        Ok(values)
    }

    fn fetch_and_merge_relationship(
        &mut self,
        session: &mut Session,
        entity: &EntityType,
        keys: &[PrimaryKey],
        relationship: &str,
        nested: &Arc<LoadNode>,
    ) -> StoreResult<()> {
        let descriptor = entity.require_relationship(relationship)?.clone();
        let related = self.schema.related(&descriptor)?;
        let columns = nested.loaded_columns().into_iter().map(String::from).collect();

        let mut query = FetchQuery::relationship(entity, &descriptor, &related, columns, keys)?;
        for join in self.eager_joins(nested, relationship)? {
            query = query.join(join);
        }
        self.run(&query)?;

        for key in keys {
            let owner = match session.find(entity.name(), key) {
                Some(owner) => owner,
                None => continue,
            };
            // Deleted owners stay unloaded
            let owner_row = match self.row(entity.name(), key) {
                Some(row) => row.clone(),
                None => continue,
            };
            self.merge_related(session, &descriptor, nested, owner, &owner_row)?;
        }

        Ok(())
    }

    fn select(
        &mut self,
        session: &mut Session,
        plan: &Arc<LoadNode>,
    ) -> StoreResult<Vec<InstanceId>> {
        let entity = plan.entity().clone();
        let columns: Vec<String> = plan.loaded_columns().into_iter().map(String::from).collect();

        let mut query = FetchQuery::rows(&entity, columns.clone());
        for join in self.eager_joins(plan, entity.table())? {
            query = query.join(join);
        }
        self.run(&query)?;

        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        let rows: Vec<Row> = self.table(entity.name()).map(|(_, row)| row.clone()).collect();

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = session.materialize(plan, &project(&row, &columns))?;
            self.merge_eager(session, plan, id, &row)?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn refresh(
        &mut self,
        session: &mut Session,
        entity: &EntityType,
        key: &PrimaryKey,
    ) -> StoreResult<()> {
        let columns: Vec<String> = entity
            .columns()
            .filter(|descriptor| {
                descriptor.is_primary_key() || descriptor.default_strategy().is_eager()
            })
            .map(|descriptor| descriptor.name().to_string())
            .collect();

        let query = FetchQuery::rows(entity, columns.clone()).with_keys(std::slice::from_ref(key));
        self.run(&query)?;

        let row = self.row(entity.name(), key).ok_or_else(|| StoreError::RowNotFound {
            entity: entity.name().to_string(),
            key: key.clone(),
        })?;
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        let row = project(row, &columns);

        if let Some(id) = session.find(entity.name(), key) {
            session.refresh_from_row(id, &row)?;
        }
        Ok(())
    }
}

/// Plan node for a relationship: the declared child, or descriptor defaults
fn child_node(
    node: &LoadNode,
    descriptor: &AttributeDescriptor,
    related: &Arc<EntityType>,
) -> Arc<LoadNode> {
    node.child(descriptor.name())
        .cloned()
        .unwrap_or_else(|| Arc::new(LoadNode::new(related.clone())))
}

fn project(row: &Row, columns: &[&str]) -> Row {
    columns
        .iter()
        .filter_map(|column| row.get(*column).map(|value| (column.to_string(), value.clone())))
        .collect()
}

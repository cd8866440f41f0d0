//! Fetch queries - the statements a store runs for selects, batch loads and refreshes

use crate::error::{LoadError, LoadResult};
use crate::model::{AttributeDescriptor, EntityType, PrimaryKey};

/// What a fetch query returns per row
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `(primary key, value)` pairs of one scalar column
    Column(String),
    /// Owner primary keys plus the related rows of one relationship (the first join)
    Relationship(String),
    /// Whole rows restricted to these columns, plus the columns of every join
    Rows(Vec<String>),
}

/// A relationship joined into a fetch query
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Alias of the joined table, the relationship name
    pub alias: String,
    /// Alias of the table the relationship starts from
    pub owner: String,
    pub table: String,
    /// `(owner column, joined column)` pairs
    pub on: Vec<(String, String)>,
    /// Columns of the joined table to select
    pub columns: Vec<String>,
}

/// One statement against the store, filtered by primary key membership
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    pub(crate) table: String,
    pub(crate) primary_key: Vec<String>,
    pub(crate) projection: Projection,
    pub(crate) joins: Vec<Join>,
    pub(crate) keys: Option<Vec<PrimaryKey>>,
}

impl FetchQuery {
    /// `SELECT (pk) AS pk, column ... WHERE (pk) IN (...)`
    pub fn column(entity: &EntityType, attribute: &str, keys: &[PrimaryKey]) -> LoadResult<Self> {
        entity.require_column(attribute)?;
        Ok(Self::new(entity, Projection::Column(attribute.to_string())).with_keys(keys))
    }

    /// Owner keys joined with the related rows of `relationship`
    pub fn relationship(
        entity: &EntityType,
        relationship: &AttributeDescriptor,
        related: &EntityType,
        columns: Vec<String>,
        keys: &[PrimaryKey],
    ) -> LoadResult<Self> {
        let join = Join::new(entity.table(), relationship, related, columns)?;
        Ok(Self::new(entity, Projection::Relationship(relationship.name().to_string()))
            .join(join)
            .with_keys(keys))
    }

    /// Whole rows of `entity`, restricted to `columns`
    pub fn rows(entity: &EntityType, columns: Vec<String>) -> Self {
        Self::new(entity, Projection::Rows(columns))
    }

    fn new(entity: &EntityType, projection: Projection) -> Self {
        Self {
            table: entity.table().to_string(),
            primary_key: entity.primary_key().to_vec(),
            projection,
            joins: Vec::new(),
            keys: None,
        }
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Restrict the query to rows whose primary key is in `keys`
    pub fn with_keys(mut self, keys: &[PrimaryKey]) -> Self {
        self.keys = Some(keys.to_vec());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn keys(&self) -> Option<&[PrimaryKey]> {
        self.keys.as_deref()
    }
}

impl Join {
    /// Join for `relationship`, starting from the table or alias `owner`
    pub fn new(
        owner: &str,
        relationship: &AttributeDescriptor,
        related: &EntityType,
        columns: Vec<String>,
    ) -> LoadResult<Self> {
        let join = relationship.join().ok_or_else(|| {
            LoadError::schema(format!(
                "'{}.{}' is not a relationship",
                relationship.owner(),
                relationship.name()
            ))
        })?;

        Ok(Self {
            alias: relationship.name().to_string(),
            owner: owner.to_string(),
            table: related.table().to_string(),
            on: join
                .pairs()
                .map(|(local, remote)| (local.to_string(), remote.to_string()))
                .collect(),
            columns,
        })
    }
}

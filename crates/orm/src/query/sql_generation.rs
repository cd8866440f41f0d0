//! Fetch query SQL generation

use serde_json::Value;

use super::fetch::{FetchQuery, Projection};

impl FetchQuery {
    /// Generate SQL with `$n` placeholders and return the bound key values
    pub fn to_sql_with_params(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        let mut fields = Vec::new();
        match &self.projection {
            Projection::Column(column) => {
                fields.push(format!("{} AS pk", self.key_tuple()));
                fields.push(format!("{}.{}", self.table, column));
            }
            Projection::Relationship(_) => {
                fields.push(format!("{} AS pk", self.key_tuple()));
            }
            Projection::Rows(columns) => {
                fields.extend(columns.iter().map(|column| format!("{}.{}", self.table, column)));
            }
        }
        for join in &self.joins {
            fields.extend(join.columns.iter().map(|column| format!("{}.{}", join.alias, column)));
        }
        sql.push_str(&fields.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        for join in &self.joins {
            sql.push_str(&format!(" LEFT OUTER JOIN {} AS {} ON ", join.table, join.alias));
            for (i, (local, remote)) in join.on.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push_str(&format!("{}.{} = {}.{}", join.owner, local, join.alias, remote));
            }
        }

        if let Some(keys) = &self.keys {
            self.build_key_condition(keys, &mut sql, &mut params);
        }

        (sql, params)
    }

    /// Primary key columns as a row value, `(numbers.id)` or `(t.a, t.b)`
    fn key_tuple(&self) -> String {
        let columns: Vec<String> = self
            .primary_key
            .iter()
            .map(|column| format!("{}.{}", self.table, column))
            .collect();
        format!("({})", columns.join(", "))
    }

    /// `WHERE (pk) IN (($1), ($2), ...)`; an empty key list matches nothing
    fn build_key_condition(
        &self,
        keys: &[crate::model::PrimaryKey],
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        if keys.is_empty() {
            sql.push_str(" WHERE 1 = 0");
            return;
        }

        sql.push_str(" WHERE ");
        sql.push_str(&self.key_tuple());
        sql.push_str(" IN (");

        let mut param_counter = 1;
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let placeholders: Vec<String> = key
                .to_values()
                .into_iter()
                .map(|value| {
                    params.push(value);
                    let placeholder = format!("${}", param_counter);
                    param_counter += 1;
                    placeholder
                })
                .collect();
            sql.push_str(&format!("({})", placeholders.join(", ")));
        }
        sql.push(')');
    }
}

//! Query result models.
//!
//! Query responses from the analytical cluster are materialized into a
//! column/row table.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of a KQL query or control command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    /// Column information.
    pub columns: Vec<ColumnInfo>,

    /// Row data (each row is a vector of JSON values).
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned.
    #[serde(default)]
    pub row_count: usize,

    /// Query execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: u64,
}

/// Column information in query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the cluster (e.g. "string", "datetime").
    pub data_type: String,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result, deriving `row_count` from the rows.
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<serde_json::Value>>, execution_time_ms: u64) -> Self {
        Self {
            row_count: rows.len(),
            columns,
            rows,
            execution_time_ms,
        }
    }

    /// Values of the named column, in row order.
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a serde_json::Value> + 'a {
        let index = self.columns.iter().position(|c| c.name == name);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|i| row.get(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_values_follow_row_order() {
        let result = QueryResult::new(
            vec![
                ColumnInfo { name: "TableName".into(), data_type: "string".into() },
                ColumnInfo { name: "Folder".into(), data_type: "string".into() },
            ],
            vec![vec![json!("stocks"), json!("")], vec![json!("trades"), json!("")]],
            5,
        );
        assert_eq!(result.row_count, 2);
        let names: Vec<_> = result.column_values("TableName").collect();
        assert_eq!(names, vec![&json!("stocks"), &json!("trades")]);
        assert_eq!(result.column_values("Missing").count(), 0);
    }
}

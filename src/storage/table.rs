//! Table document for JQLDB
//!
//! A table lives in one JSON file holding its prototype (ordered column names),
//! its properties (counters, key lists and per-column metadata) and its rows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::catalog::ColumnType;
use crate::error::{Error, Result};

/// Name of the implicit row-identity column
pub const ROW_ID: &str = "#rowid";

/// A row: column name to value, in prototype order
pub type Row = IndexMap<String, Value>;

/// Metadata of a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProperties {
    /// Declared type, e.g. `int` or `link(users.id)`
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique_key: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ColumnProperties {
    /// Properties of a plain nullable column of the given type
    pub fn new(column_type: impl Into<String>) -> Self {
        Self {
            column_type: column_type.into(),
            default: None,
            not_null: false,
            max_length: None,
            auto_increment: false,
            primary_key: false,
            unique_key: false,
        }
    }

    /// Parse the declared type
    pub fn parsed_type(&self) -> Result<ColumnType> {
        self.column_type.parse()
    }
}

/// Table-level counters, key lists and column metadata
///
/// Counters and columns share one JSON object on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProperties {
    #[serde(default)]
    pub last_insert_id: i64,
    #[serde(default)]
    pub last_valid_row_id: i64,
    #[serde(default)]
    pub last_link_id: i64,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub unique_keys: Vec<String>,
    #[serde(flatten)]
    pub columns: IndexMap<String, ColumnProperties>,
}

/// A decoded table file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    /// Ordered column names, starting with [`ROW_ID`]
    pub prototype: Vec<String>,
    pub properties: TableProperties,
    /// Rows keyed by link identifier
    #[serde(default)]
    pub data: IndexMap<String, Row>,
}

impl TableData {
    /// Create an empty table from its column metadata
    pub fn new(columns: IndexMap<String, ColumnProperties>) -> Self {
        let mut prototype = Vec::with_capacity(columns.len() + 1);
        prototype.push(ROW_ID.to_string());
        prototype.extend(columns.keys().cloned());

        let primary_keys = columns
            .iter()
            .filter(|(_, p)| p.primary_key)
            .map(|(n, _)| n.clone())
            .collect();
        let unique_keys = columns
            .iter()
            .filter(|(_, p)| p.unique_key)
            .map(|(n, _)| n.clone())
            .collect();

        Self {
            prototype,
            properties: TableProperties {
                last_insert_id: 0,
                last_valid_row_id: 0,
                last_link_id: 0,
                primary_keys,
                unique_keys,
                columns,
            },
            data: IndexMap::new(),
        }
    }

    /// Column names without the row-identity column
    pub fn visible_columns(&self) -> Vec<String> {
        self.prototype
            .iter()
            .filter(|c| c.as_str() != ROW_ID)
            .cloned()
            .collect()
    }

    /// Check if a column is declared (the row-identity column included)
    pub fn has_column(&self, name: &str) -> bool {
        self.prototype.iter().any(|c| c == name)
    }

    /// Get a column's metadata
    pub fn column(&self, name: &str) -> Option<&ColumnProperties> {
        self.properties.columns.get(name)
    }

    /// Get the auto-increment column, if any
    pub fn auto_increment_column(&self) -> Option<&str> {
        self.properties
            .columns
            .iter()
            .find(|(_, p)| p.auto_increment)
            .map(|(n, _)| n.as_str())
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Mint the next link identifier
    pub fn next_link_id(&mut self) -> String {
        self.properties.last_link_id += 1;
        link_key(self.properties.last_link_id)
    }

    /// Reorder every row's columns to prototype order and sort rows by row identity
    pub fn normalize(&mut self) {
        let prototype = &self.prototype;
        for row in self.data.values_mut() {
            row.sort_by(|a, _, b, _| position(prototype, a).cmp(&position(prototype, b)));
        }
        self.data.sort_by(|_, a, _, b| row_id(a).cmp(&row_id(b)));
    }

    /// Highest row identity currently present (0 for an empty table)
    pub fn max_row_id(&self) -> i64 {
        self.data.values().map(row_id).max().unwrap_or(0)
    }

    /// Recompute `last_insert_id` from the auto-increment column
    pub fn refresh_last_insert_id(&mut self) {
        let last = match self.auto_increment_column() {
            Some(column) => self
                .data
                .values()
                .filter_map(|row| row.get(column).and_then(Value::as_i64))
                .max()
                .unwrap_or(0),
            None => 0,
        };
        self.properties.last_insert_id = last;
    }

    /// Find the link identifier of the first row whose column equals `value`
    pub fn find_link_id(&self, column: &str, value: &Value) -> Option<&str> {
        self.data
            .iter()
            .find(|(_, row)| row.get(column) == Some(value))
            .map(|(key, _)| key.as_str())
    }

    /// Get a column's metadata or fail with a lookup error
    pub fn require_column(&self, table: &str, name: &str) -> Result<&ColumnProperties> {
        self.column(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string(), table.to_string()))
    }
}

/// Row identity of a row (0 if missing)
pub fn row_id(row: &Row) -> i64 {
    row.get(ROW_ID).and_then(Value::as_i64).unwrap_or(0)
}

/// Storage key for a link identifier counter value
pub fn link_key(id: i64) -> String {
    format!("#{}", id)
}

fn position(prototype: &[String], column: &str) -> usize {
    prototype
        .iter()
        .position(|c| c == column)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableData {
        let mut columns = IndexMap::new();
        let mut id = ColumnProperties::new("int");
        id.auto_increment = true;
        id.unique_key = true;
        id.not_null = true;
        columns.insert("id".to_string(), id);
        columns.insert("name".to_string(), ColumnProperties::new("string"));
        TableData::new(columns)
    }

    #[test]
    fn test_new_table_prototype_and_keys() {
        let table = people();
        assert_eq!(table.prototype, vec!["#rowid", "id", "name"]);
        assert_eq!(table.properties.unique_keys, vec!["id"]);
        assert!(table.properties.primary_keys.is_empty());
        assert_eq!(table.auto_increment_column(), Some("id"));
        assert_eq!(table.visible_columns(), vec!["id", "name"]);
    }

    #[test]
    fn test_document_format() {
        let table = people();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["prototype"][0], "#rowid");
        assert_eq!(json["properties"]["last_link_id"], 0);
        assert_eq!(json["properties"]["id"]["type"], "int");
        assert_eq!(json["properties"]["id"]["auto_increment"], true);
        assert!(json["properties"]["name"].get("not_null").is_none());

        let decoded: TableData = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_normalize_orders_rows_and_columns() {
        let mut table = people();
        let mut late = Row::new();
        late.insert("name".to_string(), Value::from("b"));
        late.insert(ROW_ID.to_string(), Value::Integer(2));
        late.insert("id".to_string(), Value::Integer(2));
        let mut early = Row::new();
        early.insert(ROW_ID.to_string(), Value::Integer(1));
        early.insert("id".to_string(), Value::Integer(7));
        early.insert("name".to_string(), Value::from("a"));
        table.data.insert("#2".to_string(), late);
        table.data.insert("#1".to_string(), early);

        table.normalize();
        table.refresh_last_insert_id();

        assert_eq!(table.data.keys().collect::<Vec<_>>(), vec!["#1", "#2"]);
        let columns: Vec<_> = table.data["#2"].keys().cloned().collect();
        assert_eq!(columns, vec!["#rowid", "id", "name"]);
        assert_eq!(table.max_row_id(), 2);
        assert_eq!(table.properties.last_insert_id, 7);
        assert_eq!(table.find_link_id("name", &Value::from("b")), Some("#2"));
    }
}

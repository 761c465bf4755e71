//! Value coercion for JQLDB
//!
//! Converts query values to the declared type of their column and resolves
//! link columns to the link identifier of the referenced row.

use std::collections::HashMap;

use tracing::trace;

use crate::catalog::{Catalog, ColumnType};
use crate::error::{Error, Result};
use crate::storage::{ColumnProperties, TableData, Value};

/// Coerces values for one query
///
/// Tables referenced by link columns are read once and kept for the
/// lifetime of the coercer.
pub struct Coercer<'a> {
    catalog: &'a Catalog,
    linked: HashMap<String, TableData>,
}

impl<'a> Coercer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            linked: HashMap::new(),
        }
    }

    /// Coerce a value to a column
    ///
    /// NULL takes the column default when one is declared, otherwise the
    /// zero value of the type for NOT NULL columns, otherwise stays NULL.
    pub fn coerce(&mut self, raw: &Value, properties: &ColumnProperties) -> Result<Value> {
        let column_type = properties.parsed_type()?;

        if raw.is_null() {
            return match (&properties.default, &column_type) {
                (Some(default), _) if !default.is_null() => {
                    let default = default.clone();
                    self.coerce_present(&default, &column_type, properties)
                }
                (_, ColumnType::Link { table, column }) if properties.not_null => {
                    Err(Error::LinkValueNotFound {
                        table: table.clone(),
                        column: column.clone(),
                        value: "null".to_string(),
                    })
                }
                _ if properties.not_null => Ok(column_type.zero_value()),
                _ => Ok(Value::Null),
            };
        }

        self.coerce_present(raw, &column_type, properties)
    }

    fn coerce_present(
        &mut self,
        raw: &Value,
        column_type: &ColumnType,
        properties: &ColumnProperties,
    ) -> Result<Value> {
        match column_type {
            ColumnType::Link { table, column } => self.resolve_link(raw, table, column),
            other => Ok(other.convert(raw, properties.max_length)),
        }
    }

    /// Find the link identifier of the row of `table` whose `column` equals `raw`
    fn resolve_link(&mut self, raw: &Value, table: &str, column: &str) -> Result<Value> {
        if !self.linked.contains_key(table) {
            trace!(table = %table, "Loading linked table");
            let data = self.catalog.read_table(table)?;
            self.linked.insert(table.to_string(), data);
        }
        let target_properties = match self.linked.get(table) {
            Some(data) => data.require_column(table, column)?.clone(),
            None => return Err(Error::TableNotFound(table.to_string())),
        };

        let value = self.coerce(raw, &target_properties)?;

        self.linked
            .get(table)
            .and_then(|data| data.find_link_id(column, &value))
            .map(|id| Value::String(id.to_string()))
            .ok_or_else(|| Error::LinkValueNotFound {
                table: table.to_string(),
                column: column.to_string(),
                value: value.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, TableBuilder};
    use crate::config::EngineConfig;
    use crate::storage::{write_table, Row, ROW_ID};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new(
            EngineConfig::new()
                .storage_path(dir.path())
                .database("db"),
        );
        catalog.create_database().unwrap();
        (dir, catalog)
    }

    #[test]
    fn test_null_handling() {
        let (_dir, catalog) = setup();
        let mut coercer = Coercer::new(&catalog);

        let plain = ColumnProperties::new("int");
        assert_eq!(coercer.coerce(&Value::Null, &plain).unwrap(), Value::Null);

        let mut required = ColumnProperties::new("string");
        required.not_null = true;
        assert_eq!(
            coercer.coerce(&Value::Null, &required).unwrap(),
            Value::from("")
        );

        let mut defaulted = ColumnProperties::new("int");
        defaulted.default = Some(Value::from("12"));
        assert_eq!(
            coercer.coerce(&Value::Null, &defaulted).unwrap(),
            Value::Integer(12)
        );
    }

    #[test]
    fn test_type_conversion() {
        let (_dir, catalog) = setup();
        let mut coercer = Coercer::new(&catalog);

        let mut name = ColumnProperties::new("string");
        name.max_length = Some(3);
        assert_eq!(
            coercer.coerce(&Value::from("alice"), &name).unwrap(),
            Value::from("ali")
        );

        let flag = ColumnProperties::new("bool");
        assert_eq!(
            coercer.coerce(&Value::Integer(0), &flag).unwrap(),
            Value::Boolean(false)
        );

        let odd = ColumnProperties::new("datetime");
        assert!(matches!(
            coercer.coerce(&Value::Integer(1), &odd),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_link_resolution() {
        let (_dir, catalog) = setup();
        let mut customers = TableBuilder::new("customers")
            .with_column(Column::new("id", "int").primary_key(true))
            .build(&catalog)
            .unwrap();
        let mut row = Row::new();
        row.insert(ROW_ID.to_string(), Value::Integer(1));
        row.insert("id".to_string(), Value::Integer(42));
        customers.data.insert("#7".to_string(), row);
        write_table(catalog.table_path("customers"), &customers).unwrap();

        let link = ColumnProperties::new("link(customers.id)");
        let mut coercer = Coercer::new(&catalog);

        assert_eq!(
            coercer.coerce(&Value::from("42"), &link).unwrap(),
            Value::from("#7")
        );
        assert!(matches!(
            coercer.coerce(&Value::Integer(5), &link),
            Err(Error::LinkValueNotFound { .. })
        ));
        assert_eq!(coercer.coerce(&Value::Null, &link).unwrap(), Value::Null);
    }
}

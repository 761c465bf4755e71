//! Schema definitions for JQLDB
//!
//! This module defines the column specifications used to create tables.

use serde::{Deserialize, Serialize};

use crate::storage::{ColumnProperties, Value};

/// Column definition given at table creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type; `None` means `string`
    pub column_type: Option<String>,
    /// Default value
    pub default: Option<Value>,
    /// Is NULL rejected?
    pub not_null: bool,
    /// String length or float decimals
    pub max_length: Option<usize>,
    /// Is the value assigned by the engine on insert?
    pub auto_increment: bool,
    /// Is this part of the primary key?
    pub primary_key: bool,
    /// Is this column unique?
    pub unique_key: bool,
}

impl Column {
    /// Create a new column with minimal required fields
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: Some(column_type.into()),
            default: None,
            not_null: false,
            max_length: None,
            auto_increment: false,
            primary_key: false,
            unique_key: false,
        }
    }

    /// Create a column without a declared type
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            column_type: None,
            ..Self::new(name, "")
        }
    }

    /// Set NOT NULL flag
    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Set default value
    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set maximum length
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set auto-increment flag
    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    /// Set primary key flag
    pub fn primary_key(mut self, pk: bool) -> Self {
        self.primary_key = pk;
        self
    }

    /// Set unique flag
    pub fn unique_key(mut self, unique: bool) -> Self {
        self.unique_key = unique;
        self
    }

    /// Raw properties before normalization
    pub(crate) fn raw_properties(&self) -> ColumnProperties {
        ColumnProperties {
            column_type: self
                .column_type
                .clone()
                .unwrap_or_else(|| "string".to_string()),
            default: self.default.clone().filter(|v| !v.is_null()),
            not_null: self.not_null,
            max_length: self.max_length,
            auto_increment: self.auto_increment,
            primary_key: self.primary_key,
            unique_key: self.unique_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_builder() {
        let col = Column::new("email", "string")
            .max_length(255)
            .unique_key(true)
            .default("none");

        assert_eq!(col.name, "email");
        assert!(col.unique_key);
        assert_eq!(col.max_length, Some(255));

        let props = col.raw_properties();
        assert_eq!(props.column_type, "string");
        assert_eq!(props.default, Some(Value::from("none")));
    }

    #[test]
    fn test_untyped_defaults_to_string() {
        let props = Column::untyped("notes").raw_properties();
        assert_eq!(props.column_type, "string");
        assert!(!props.not_null);
    }
}

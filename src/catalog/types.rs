//! Column types for JQLDB
//!
//! This module defines the column types a table may declare.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::storage::Value;

/// Declared column type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `int`, `integer` or `number`
    Integer,
    /// `float` or `decimal`
    Float,
    /// Variable-length string
    String,
    /// Single character
    Char,
    /// `bool` or `boolean`
    Boolean,
    /// Array of values
    Array,
    /// Reference to a key column of another table: `link(table.column)`
    Link { table: String, column: String },
}

impl ColumnType {
    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Check if this type references another table
    pub fn is_link(&self) -> bool {
        matches!(self, ColumnType::Link { .. })
    }

    /// Value a NOT NULL column takes when given NULL without a default
    pub fn zero_value(&self) -> Value {
        match self {
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::String | ColumnType::Char => Value::String(String::new()),
            ColumnType::Boolean => Value::Boolean(false),
            ColumnType::Array => Value::Array(Vec::new()),
            ColumnType::Link { .. } => Value::Null,
        }
    }

    /// Convert a non-null value to this type
    ///
    /// `max_length` truncates strings to that many characters and rounds floats
    /// to that many decimals. Link values are returned unchanged; resolving them
    /// needs the referenced table.
    pub fn convert(&self, value: &Value, max_length: Option<usize>) -> Value {
        match self {
            ColumnType::Integer => Value::Integer(value.to_integer()),
            ColumnType::Float => {
                let f = value.to_float();
                match max_length {
                    Some(decimals) => {
                        let factor = 10f64.powi(decimals.min(15) as i32);
                        Value::Float((f * factor).round() / factor)
                    }
                    None => Value::Float(f),
                }
            }
            ColumnType::String => {
                let s = value_text(value);
                match max_length {
                    Some(max) => Value::String(s.chars().take(max).collect()),
                    None => Value::String(s),
                }
            }
            ColumnType::Char => Value::String(value_text(value).chars().take(1).collect()),
            ColumnType::Boolean => Value::Boolean(value.to_boolean()),
            ColumnType::Array => match value {
                Value::Array(_) => value.clone(),
                other => Value::Array(vec![other.clone()]),
            },
            ColumnType::Link { .. } => value.clone(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let column_type = match lower.as_str() {
            "int" | "integer" | "number" => ColumnType::Integer,
            "float" | "decimal" => ColumnType::Float,
            "string" => ColumnType::String,
            "char" => ColumnType::Char,
            "bool" | "boolean" => ColumnType::Boolean,
            "array" => ColumnType::Array,
            other => {
                let target = other
                    .strip_prefix("link(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| Error::UnsupportedType(s.to_string()))?;
                // keep the original case of table and column names
                let target = &s.trim()[5..5 + target.len()];
                match target.split_once('.') {
                    Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                        ColumnType::Link {
                            table: table.trim().to_string(),
                            column: column.trim().to_string(),
                        }
                    }
                    _ => return Err(Error::UnsupportedType(s.to_string())),
                }
            }
        };
        Ok(column_type)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "int"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::String => write!(f, "string"),
            ColumnType::Char => write!(f, "char"),
            ColumnType::Boolean => write!(f, "bool"),
            ColumnType::Array => write!(f, "array"),
            ColumnType::Link { table, column } => write!(f, "link({}.{})", table, column),
        }
    }
}

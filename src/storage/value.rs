//! Value type for JQLDB
//!
//! This module defines how cell values are represented in memory and how they
//! map onto the JSON table document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A value stored in a table cell
///
/// Serialized untagged so a row decodes straight from its JSON object.
/// Variant order matters: integers are tried before floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value (64-bit)
    Integer(i64),
    /// Float value (64-bit)
    Float(f64),
    /// String value
    String(String),
    /// Array value
    Array(Vec<Value>),
    /// Nested object, produced by joins through link columns
    Object(IndexMap<String, Value>),
}

// Floats compare bitwise so values can key hash sets during key validation
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Array(v) => v.hash(state),
            Value::Object(v) => {
                for (key, value) in v {
                    key.hash(state);
                    value.hash(state);
                }
            }
        }
    }
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value counts as empty for unique-key purposes
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }

    /// Check if this value is an integer or a float
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Try to convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Try to convert to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Integer view of any value, parsing the leading digits of strings
    pub fn to_integer(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Boolean(b) => *b as i64,
            Value::Integer(i) => *i,
            Value::Float(f) => *f as i64,
            Value::String(s) => leading_integer(s),
            Value::Array(a) => (!a.is_empty()) as i64,
            Value::Object(o) => (!o.is_empty()) as i64,
        }
    }

    /// Float view of any value, parsing the leading number of strings
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Float(f) => *f,
            Value::String(s) => leading_float(s),
            other => other.to_integer() as f64,
        }
    }

    /// Truthiness of any value
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    /// Compare two values (for where conditions and order extensions)
    ///
    /// NULL sorts before everything and only equals NULL. Two numeric operands
    /// compare numerically, anything else compares by display string.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,

            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.to_float(), b.to_float());
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }

            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }

    /// Equality under the same rule as [`Value::compare`]
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    s[..end].parse().unwrap_or(0)
}

fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let mut seen_dot = false;
    let end = s
        .char_indices()
        .take_while(|&(i, c)| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))
            }
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    s[..end].parse().unwrap_or(0.0)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip_keeps_integers() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 3.5, "x", [1]]"#).unwrap();
        assert_eq!(values[0], Value::Null);
        assert_eq!(values[1], Value::Boolean(true));
        assert_eq!(values[2], Value::Integer(3));
        assert_eq!(values[3], Value::Float(3.5));
        assert_eq!(values[4], Value::String("x".to_string()));
        assert_eq!(values[5], Value::Array(vec![Value::Integer(1)]));
    }

    #[test]
    fn test_compare_numeric_and_mixed() {
        assert_eq!(Value::Integer(2).compare(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Integer(10).compare(&Value::Integer(9)), Ordering::Greater);
        // "10" < "9" lexicographically once one side is not numeric
        assert_eq!(
            Value::String("10".into()).compare(&Value::Integer(9)),
            Ordering::Less
        );
        assert_eq!(Value::Null.compare(&Value::Integer(0)), Ordering::Less);
        assert!(!Value::Null.loose_eq(&Value::String(String::new())));
        assert!(Value::Integer(1).loose_eq(&Value::Float(1.0)));
    }

    #[test]
    fn test_lossy_conversions() {
        assert_eq!(Value::String("42abc".into()).to_integer(), 42);
        assert_eq!(Value::String("abc".into()).to_integer(), 0);
        assert_eq!(Value::String("-7".into()).to_integer(), -7);
        assert_eq!(Value::String("3.25kg".into()).to_float(), 3.25);
        assert!(!Value::String("0".into()).to_boolean());
        assert!(Value::Integer(5).to_boolean());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::from("a")]).to_string(),
            r#"[1,"a"]"#
        );
    }
}

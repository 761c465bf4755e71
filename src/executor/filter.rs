//! Row filtering for JQLDB
//!
//! This module evaluates `where()` conditions and scalar functions.

use std::cmp::Ordering;
use std::str::FromStr;

use md5::Md5;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::jql::{Condition, FieldRef, Literal, ScalarFunction};
use crate::storage::{Row, TableData, Value};

/// Comparison operator of a where condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    /// `%=`: the field is a multiple of the value
    ModEq,
    /// `%!`: the field is not a multiple of the value
    ModNe,
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            "=" => Ok(Operator::Eq),
            ">=" => Ok(Operator::Ge),
            ">" => Ok(Operator::Gt),
            "!=" | "<>" => Ok(Operator::Ne),
            "%=" => Ok(Operator::ModEq),
            "%!" => Ok(Operator::ModNe),
            _ => Err(Error::UnknownOperator(s.to_string())),
        }
    }
}

impl Operator {
    /// Apply the operator to a field value and a condition value
    pub fn test(&self, left: &Value, right: &Value) -> Result<bool> {
        let matched = match self {
            Operator::Lt => left.compare(right) == Ordering::Less,
            Operator::Le => left.compare(right) != Ordering::Greater,
            Operator::Eq => left.compare(right) == Ordering::Equal,
            Operator::Ge => left.compare(right) != Ordering::Less,
            Operator::Gt => left.compare(right) == Ordering::Greater,
            Operator::Ne => left.compare(right) != Ordering::Equal,
            Operator::ModEq => remainder(left, right)? == 0,
            Operator::ModNe => remainder(left, right)? != 0,
        };
        Ok(matched)
    }
}

fn remainder(left: &Value, right: &Value) -> Result<i64> {
    let divisor = right.to_integer();
    if divisor == 0 {
        return Err(Error::DivisionByZero);
    }
    Ok(left.to_integer().checked_rem(divisor).unwrap_or(0))
}

impl ScalarFunction {
    /// Apply the function to a value
    pub fn apply(&self, value: &Value) -> Value {
        let text = text_of(value);
        match self {
            ScalarFunction::Sha1 => Value::String(hex::encode(Sha1::digest(text.as_bytes()))),
            ScalarFunction::Md5 => Value::String(hex::encode(Md5::digest(text.as_bytes()))),
            ScalarFunction::Lowercase => Value::String(text.to_lowercase()),
            ScalarFunction::Uppercase => Value::String(text.to_uppercase()),
            ScalarFunction::Ucfirst => {
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => Value::String(first.to_uppercase().chain(chars).collect()),
                    None => Value::String(String::new()),
                }
            }
            ScalarFunction::Strlen => Value::Integer(text.chars().count() as i64),
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate a literal to a value
///
/// `last_insert_id` is the counter of the queried table.
pub fn evaluate_literal(literal: &Literal, last_insert_id: i64) -> Result<Value> {
    match literal {
        Literal::Value(value) => Ok(value.clone()),
        Literal::Function { function, argument } => {
            let argument = evaluate_literal(argument, last_insert_id)?;
            Ok(function.apply(&argument))
        }
        Literal::LastInsertId => Ok(Value::Integer(last_insert_id)),
        Literal::Placeholder(name) => Err(Error::QueryState(format!(
            "no value bound for the placeholder ':{}'",
            name
        ))),
    }
}

/// Read a field of a row, applying its function if any
pub fn field_value(row: &Row, field: &FieldRef) -> Value {
    let value = row.get(&field.column).unwrap_or(&Value::Null);
    match field.function {
        Some(function) => function.apply(value),
        None => value.clone(),
    }
}

/// A condition with its operator resolved and its value evaluated
#[derive(Debug, Clone)]
struct CompiledCondition {
    field: FieldRef,
    operator: Operator,
    value: Value,
}

/// Compiled `where()` extensions
///
/// Conditions of one `where()` call are AND'ed; a row is kept when it
/// passes any call.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    groups: Vec<Vec<CompiledCondition>>,
}

impl Filter {
    /// Compile condition groups against a table
    pub fn compile(groups: &[&[Condition]], table_name: &str, table: &TableData) -> Result<Self> {
        let last_insert_id = table.properties.last_insert_id;
        let mut compiled = Vec::with_capacity(groups.len());

        for group in groups {
            let mut conditions = Vec::with_capacity(group.len());
            for condition in group.iter() {
                if !table.has_column(&condition.field.column) {
                    return Err(Error::ColumnNotFound(
                        condition.field.column.clone(),
                        table_name.to_string(),
                    ));
                }
                conditions.push(CompiledCondition {
                    field: condition.field.clone(),
                    operator: condition.operator.parse()?,
                    value: evaluate_literal(&condition.value, last_insert_id)?,
                });
            }
            compiled.push(conditions);
        }

        Ok(Self { groups: compiled })
    }

    /// Check if there are no conditions
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Check if a row passes the filter
    pub fn matches(&self, row: &Row) -> Result<bool> {
        if self.groups.is_empty() {
            return Ok(true);
        }
        for group in &self.groups {
            let mut passed = true;
            for condition in group {
                let value = field_value(row, &condition.field);
                if !condition.operator.test(&value, &condition.value)? {
                    passed = false;
                    break;
                }
            }
            if passed {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Keep the rows passing the filter, in their input order
    pub fn apply(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if self.matches(&row)? {
                kept.push(row);
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jql::parse;
    use crate::storage::{ColumnProperties, ROW_ID};
    use indexmap::IndexMap;

    fn table() -> TableData {
        let mut columns = IndexMap::new();
        columns.insert("name".to_string(), ColumnProperties::new("string"));
        columns.insert("age".to_string(), ColumnProperties::new("int"));
        let mut table = TableData::new(columns);
        for (i, (name, age)) in [("alice", 30), ("bob", 25), ("carol", 41)].iter().enumerate() {
            let mut row = Row::new();
            row.insert(ROW_ID.to_string(), Value::Integer(i as i64 + 1));
            row.insert("name".to_string(), Value::from(*name));
            row.insert("age".to_string(), Value::from(*age));
            table.data.insert(format!("#{}", i + 1), row);
        }
        table.properties.last_insert_id = 2;
        table
    }

    fn names(query: &str) -> Result<Vec<String>> {
        let table = table();
        let plan = parse(query)?;
        let filter = Filter::compile(&plan.where_groups(), "people", &table)?;
        let rows = filter.apply(table.data.values().cloned().collect())?;
        Ok(rows
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect())
    }

    #[test]
    fn test_and_within_group() {
        assert_eq!(
            names("people.select(*).where(age > 24, age < 35)").unwrap(),
            vec!["alice", "bob"]
        );
    }

    #[test]
    fn test_union_across_groups() {
        assert_eq!(
            names("people.select(*).where(name = 'carol').where(age <= 25)").unwrap(),
            vec!["bob", "carol"]
        );
    }

    #[test]
    fn test_modulo_and_functions() {
        assert_eq!(
            names("people.select(*).where(age %= 5)").unwrap(),
            vec!["alice", "bob"]
        );
        assert_eq!(
            names("people.select(*).where(strlen(name) %! 5)").unwrap(),
            vec!["bob"]
        );
        assert_eq!(
            names("people.select(*).where(#rowid = last_insert_id)").unwrap(),
            vec!["bob"]
        );
        assert!(matches!(
            names("people.select(*).where(age %= 0)"),
            Err(Error::DivisionByZero)
        ));
    }

    #[test]
    fn test_unknown_operator_and_column() {
        assert!(matches!(
            names("people.select(*).where(age => 1)"),
            Err(Error::UnknownOperator(op)) if op == "=>"
        ));
        assert!(matches!(
            names("people.select(*).where(height > 1)"),
            Err(Error::ColumnNotFound(..))
        ));
    }

    #[test]
    fn test_scalar_functions() {
        let v = Value::from("hello");
        assert_eq!(
            ScalarFunction::Md5.apply(&v),
            Value::from("5d41402abc4b2a76b9719d911017c592")
        );
        assert_eq!(
            ScalarFunction::Sha1.apply(&v),
            Value::from("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
        );
        assert_eq!(ScalarFunction::Ucfirst.apply(&v), Value::from("Hello"));
        assert_eq!(ScalarFunction::Uppercase.apply(&v), Value::from("HELLO"));
        assert_eq!(ScalarFunction::Strlen.apply(&Value::from("héllo")), Value::Integer(5));
    }
}

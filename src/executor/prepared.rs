//! Prepared statements for JQLDB

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::jql::{parse, Plan};
use crate::storage::Value;

/// How a bound value is converted before substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Boolean,
    Null,
    Array,
}

impl ParamType {
    /// Convert a bound value
    pub fn convert(&self, value: Value) -> Value {
        match self {
            ParamType::String => match value {
                Value::String(s) => Value::String(s),
                Value::Null => Value::String(String::new()),
                other => Value::String(other.to_string()),
            },
            ParamType::Integer => Value::Integer(value.to_integer()),
            ParamType::Boolean => Value::Boolean(value.to_integer() != 0),
            ParamType::Null => Value::Null,
            ParamType::Array => match value {
                Value::Array(items) => Value::Array(items),
                Value::Null => Value::Array(Vec::new()),
                scalar => Value::Array(vec![scalar]),
            },
        }
    }
}

/// A parsed query with `:name` placeholders
///
/// Every placeholder must be bound exactly once before the single execution.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    query: String,
    plan: Plan,
    expected: Vec<String>,
    bindings: HashMap<String, Value>,
    executed: bool,
}

impl PreparedStatement {
    /// Parse a query and collect its placeholders
    pub fn new(query: &str) -> Result<Self> {
        let plan = parse(query)?;
        let expected = plan.placeholders();
        Ok(Self {
            query: query.to_string(),
            plan,
            expected,
            bindings: HashMap::new(),
            executed: false,
        })
    }

    pub fn query_string(&self) -> &str {
        &self.query
    }

    /// Placeholder names in order of first appearance, without the colon
    pub fn placeholders(&self) -> &[String] {
        &self.expected
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Bind a value to a placeholder, given as `:name` or `name`
    pub fn bind_value(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        param_type: ParamType,
    ) -> Result<()> {
        let key = name.strip_prefix(':').unwrap_or(name);
        if self.executed {
            return Err(Error::QueryState(
                "cannot bind a value to an executed statement".to_string(),
            ));
        }
        if !self.expected.iter().any(|n| n == key) {
            return Err(Error::QueryState(format!(
                "the key ':{}' is not in the query",
                key
            )));
        }
        if self.bindings.contains_key(key) {
            return Err(Error::QueryState(format!(
                "the key ':{}' is already bound",
                key
            )));
        }
        self.bindings
            .insert(key.to_string(), param_type.convert(value.into()));
        Ok(())
    }

    /// Hand out the bound plan, marking the statement executed
    pub(crate) fn take_plan(&mut self) -> Result<Plan> {
        if self.executed {
            return Err(Error::QueryState(
                "the prepared statement has already been executed".to_string(),
            ));
        }
        if let Some(missing) = self.expected.iter().find(|n| !self.bindings.contains_key(*n)) {
            return Err(Error::QueryState(format!(
                "no value bound for the placeholder ':{}'",
                missing
            )));
        }

        let mut plan = self.plan.clone();
        plan.bind(&self.bindings);
        self.executed = true;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jql::{Literal, Param};

    #[test]
    fn test_param_type_conversion() {
        assert_eq!(ParamType::String.convert(Value::Integer(4)), Value::from("4"));
        assert_eq!(ParamType::Integer.convert(Value::from("12abc")), Value::Integer(12));
        assert_eq!(ParamType::Boolean.convert(Value::from("1")), Value::Boolean(true));
        assert_eq!(ParamType::Null.convert(Value::from("x")), Value::Null);
        assert_eq!(
            ParamType::Array.convert(Value::Integer(1)),
            Value::Array(vec![Value::Integer(1)])
        );
    }

    #[test]
    fn test_bind_lifecycle() {
        let mut stmt = PreparedStatement::new("users.insert(:name, :age)").unwrap();
        assert_eq!(stmt.placeholders(), &["name".to_string(), "age".to_string()]);

        stmt.bind_value(":name", "alice", ParamType::String).unwrap();
        assert!(matches!(
            stmt.bind_value("name", "bob", ParamType::String),
            Err(Error::QueryState(_))
        ));
        assert!(matches!(
            stmt.bind_value(":email", "x", ParamType::String),
            Err(Error::QueryState(_))
        ));
        assert!(matches!(stmt.take_plan(), Err(Error::QueryState(_))));

        stmt.bind_value("age", "30", ParamType::Integer).unwrap();
        let plan = stmt.take_plan().unwrap();
        assert_eq!(
            plan.params,
            vec![
                Param::Value(Literal::Value(Value::from("alice"))),
                Param::Value(Literal::Value(Value::Integer(30))),
            ]
        );
        assert!(stmt.is_executed());
        assert!(matches!(stmt.take_plan(), Err(Error::QueryState(_))));
    }
}

//! JQL Abstract Syntax Tree (AST)
//!
//! This module defines the query plan produced by the parser.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::storage::Value;

/// A parsed query: `table.action(params)[.extension(args)]*`
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Target table
    pub table: String,
    /// Main action
    pub action: Action,
    /// Action parameters
    pub params: Vec<Param>,
    /// Extensions in query order
    pub extensions: Vec<Extension>,
}

/// Main query action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Select,
    Insert,
    Delete,
    Replace,
    Truncate,
    Update,
    Count,
}

impl Action {
    /// Lowercase action name
    pub fn name(&self) -> &'static str {
        match self {
            Action::Select => "select",
            Action::Insert => "insert",
            Action::Delete => "delete",
            Action::Replace => "replace",
            Action::Truncate => "truncate",
            Action::Update => "update",
            Action::Count => "count",
        }
    }

    /// Check if the parameters of this action are value literals
    pub fn takes_values(&self) -> bool {
        matches!(self, Action::Insert | Action::Replace)
    }

    /// Check if this action rewrites the table file
    pub fn is_write(&self) -> bool {
        !matches!(self, Action::Select | Action::Count)
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(Action::Select),
            "insert" => Ok(Action::Insert),
            "delete" => Ok(Action::Delete),
            "replace" => Ok(Action::Replace),
            "truncate" => Ok(Action::Truncate),
            "update" => Ok(Action::Update),
            "count" => Ok(Action::Count),
            _ => Err(Error::UnsupportedAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Scalar function usable on a column or a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFunction {
    Sha1,
    Md5,
    Lowercase,
    Uppercase,
    Ucfirst,
    Strlen,
}

impl ScalarFunction {
    /// Look up a function by name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha1" => Some(ScalarFunction::Sha1),
            "md5" => Some(ScalarFunction::Md5),
            "lowercase" => Some(ScalarFunction::Lowercase),
            "uppercase" => Some(ScalarFunction::Uppercase),
            "ucfirst" => Some(ScalarFunction::Ucfirst),
            "strlen" => Some(ScalarFunction::Strlen),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::Sha1 => "sha1",
            ScalarFunction::Md5 => "md5",
            ScalarFunction::Lowercase => "lowercase",
            ScalarFunction::Uppercase => "uppercase",
            ScalarFunction::Ucfirst => "ucfirst",
            ScalarFunction::Strlen => "strlen",
        }
    }
}

/// A column, optionally wrapped in a scalar function: `name` or `md5(name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub column: String,
    pub function: Option<ScalarFunction>,
}

impl FieldRef {
    pub fn column(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            function: None,
        }
    }

    pub fn function(function: ScalarFunction, column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            function: Some(function),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.function {
            Some(function) => write!(f, "{}({})", function.name(), self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// Action parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// `*`
    All,
    /// The `last_insert_id` pseudo-column
    LastInsertId,
    /// A column or function over a column (non-value actions)
    Field(FieldRef),
    /// A value literal (insert and replace)
    Value(Literal),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::All => write!(f, "*"),
            Param::LastInsertId => write!(f, "last_insert_id"),
            Param::Field(field) => write!(f, "{}", field),
            Param::Value(literal) => write!(f, "{}", literal),
        }
    }
}

/// A value in value position
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// A constant
    Value(Value),
    /// A scalar function applied to a literal, e.g. `md5('secret')`
    Function {
        function: ScalarFunction,
        argument: Box<Literal>,
    },
    /// The table's `last_insert_id` counter (where conditions only)
    LastInsertId,
    /// An unbound `:name` placeholder
    Placeholder(String),
}

impl Literal {
    fn collect_placeholders(&self, out: &mut Vec<String>) {
        match self {
            Literal::Placeholder(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Literal::Function { argument, .. } => argument.collect_placeholders(out),
            Literal::Value(_) | Literal::LastInsertId => {}
        }
    }

    fn bind(&mut self, bindings: &HashMap<String, Value>) {
        match self {
            Literal::Placeholder(name) => {
                if let Some(value) = bindings.get(name) {
                    *self = Literal::Value(value.clone());
                }
            }
            Literal::Function { argument, .. } => argument.bind(bindings),
            Literal::Value(_) | Literal::LastInsertId => {}
        }
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        Literal::Value(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Value(Value::String(s)) => write!(f, "{}", super::quote(s)),
            Literal::Value(v) => write!(f, "{}", v),
            Literal::Function { function, argument } => {
                write!(f, "{}({})", function.name(), argument)
            }
            Literal::LastInsertId => write!(f, "last_insert_id"),
            Literal::Placeholder(name) => write!(f, ":{}", name),
        }
    }
}

/// A where condition: `field operator value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: FieldRef,
    /// Raw operator symbol
    pub operator: String,
    pub value: Literal,
}

/// Sort direction of `order()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// Query extension
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    /// `order(column[, asc|desc])`
    Order {
        column: String,
        direction: OrderDirection,
    },
    /// `where(condition, ...)`: conditions are AND'ed
    Where(Vec<Condition>),
    /// `and(value, ...)`: another row for insert and replace
    And(Vec<Literal>),
    /// `limit([offset,] count)`
    Limit { offset: usize, count: usize },
    /// `in(column, ...)`: target columns of insert and replace
    In(Vec<String>),
    /// `with(value, ...)`: new values of update
    With(Vec<Literal>),
    /// `as(alias, ...)`
    As(Vec<String>),
    /// `group(column)`
    Group(String),
    /// `on(column)`: link column to join through
    On(String),
    /// `link(column, ...)`: columns pulled from the joined row
    Link(Vec<String>),
}

impl Extension {
    pub fn name(&self) -> &'static str {
        match self {
            Extension::Order { .. } => "order",
            Extension::Where(_) => "where",
            Extension::And(_) => "and",
            Extension::Limit { .. } => "limit",
            Extension::In(_) => "in",
            Extension::With(_) => "with",
            Extension::As(_) => "as",
            Extension::Group(_) => "group",
            Extension::On(_) => "on",
            Extension::Link(_) => "link",
        }
    }

    /// Check if the extension may appear more than once
    pub fn is_repeatable(&self) -> bool {
        matches!(
            self,
            Extension::Where(_) | Extension::And(_) | Extension::On(_) | Extension::Link(_)
        )
    }
}

impl Plan {
    /// `order()` column and direction
    pub fn order(&self) -> Option<(&str, OrderDirection)> {
        self.extensions.iter().find_map(|e| match e {
            Extension::Order { column, direction } => Some((column.as_str(), *direction)),
            _ => None,
        })
    }

    /// Condition groups, one per `where()` call
    pub fn where_groups(&self) -> Vec<&[Condition]> {
        self.extensions
            .iter()
            .filter_map(|e| match e {
                Extension::Where(conditions) => Some(conditions.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Extra value batches, one per `and()` call
    pub fn and_batches(&self) -> Vec<&[Literal]> {
        self.extensions
            .iter()
            .filter_map(|e| match e {
                Extension::And(values) => Some(values.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// `limit()` as (offset, count)
    pub fn limit(&self) -> Option<(usize, usize)> {
        self.extensions.iter().find_map(|e| match e {
            Extension::Limit { offset, count } => Some((*offset, *count)),
            _ => None,
        })
    }

    pub fn in_columns(&self) -> Option<&[String]> {
        self.extensions.iter().find_map(|e| match e {
            Extension::In(columns) => Some(columns.as_slice()),
            _ => None,
        })
    }

    pub fn with_values(&self) -> Option<&[Literal]> {
        self.extensions.iter().find_map(|e| match e {
            Extension::With(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn aliases(&self) -> Option<&[String]> {
        self.extensions.iter().find_map(|e| match e {
            Extension::As(aliases) => Some(aliases.as_slice()),
            _ => None,
        })
    }

    pub fn group(&self) -> Option<&str> {
        self.extensions.iter().find_map(|e| match e {
            Extension::Group(column) => Some(column.as_str()),
            _ => None,
        })
    }

    /// `on()` columns in query order
    pub fn on_columns(&self) -> Vec<&str> {
        self.extensions
            .iter()
            .filter_map(|e| match e {
                Extension::On(column) => Some(column.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `link()` column lists in query order
    pub fn link_columns(&self) -> Vec<&[String]> {
        self.extensions
            .iter()
            .filter_map(|e| match e {
                Extension::Link(columns) => Some(columns.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        for literal in self.literals() {
            literal.collect_placeholders(&mut names);
        }
        names
    }

    /// Replace bound placeholders by their values
    pub fn bind(&mut self, bindings: &HashMap<String, Value>) {
        for literal in self.literals_mut() {
            literal.bind(bindings);
        }
    }

    fn literals(&self) -> impl Iterator<Item = &Literal> {
        let params = self.params.iter().filter_map(|p| match p {
            Param::Value(literal) => Some(literal),
            _ => None,
        });
        let extensions = self.extensions.iter().flat_map(|e| {
            let literals: Vec<&Literal> = match e {
                Extension::Where(conditions) => conditions.iter().map(|c| &c.value).collect(),
                Extension::And(values) | Extension::With(values) => values.iter().collect(),
                _ => Vec::new(),
            };
            literals
        });
        params.chain(extensions)
    }

    fn literals_mut(&mut self) -> impl Iterator<Item = &mut Literal> {
        let params = self.params.iter_mut().filter_map(|p| match p {
            Param::Value(literal) => Some(literal),
            _ => None,
        });
        let extensions = self.extensions.iter_mut().flat_map(|e| {
            let literals: Vec<&mut Literal> = match e {
                Extension::Where(conditions) => {
                    conditions.iter_mut().map(|c| &mut c.value).collect()
                }
                Extension::And(values) | Extension::With(values) => values.iter_mut().collect(),
                _ => Vec::new(),
            };
            literals
        });
        params.chain(extensions)
    }
}

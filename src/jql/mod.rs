//! JQL query language module
//!
//! Queries look like `table.action(params).extension(args)...`. This module
//! contains:
//! - Token definitions
//! - Lexer (tokenizer)
//! - Query plan definitions
//! - Parser

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{
    Action, Condition, Extension, FieldRef, Literal, OrderDirection, Param, Plan, ScalarFunction,
};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::Token;

use crate::error::Result;

/// Characters escaped inside quoted strings
const RESERVED: &[char] = &['\\', '\'', ',', '.', '(', ')', ';'];

/// Parse a JQL query into a plan
pub fn parse(query: &str) -> Result<Plan> {
    Parser::new(query)?.parse()
}

/// Quote a string for use as a JQL value, escaping reserved characters
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if RESERVED.contains(&ch) {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    #[test]
    fn test_quote_reverses_exactly() {
        let raw = r"a.b,c(d);e'f\g";
        let quoted = quote(raw);
        assert_eq!(quoted, r"'a\.b\,c\(d\)\;e\'f\\g'");

        let plan = parse(&format!("t.insert({})", quoted)).unwrap();
        assert_eq!(plan.params, vec![Param::Value(Literal::Value(Value::from(raw)))]);
    }
}

//! Error types for JQLDB
//!
//! This module defines all error types used throughout the database engine.

use thiserror::Error;

/// The main error type for JQLDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Lexer Errors ==========
    #[error("Parse error: unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Parse error: unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Parse error: invalid number format at position {0}")]
    InvalidNumber(usize),

    // ========== Parser Errors ==========
    #[error("Parse error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Parse error: the action '{0}' is not supported")]
    UnsupportedAction(String),

    #[error("Parse error: the '{extension}()' extension expects {expected} argument(s), {found} given")]
    ExtensionArity {
        extension: String,
        expected: String,
        found: usize,
    },

    // ========== Database Errors ==========
    #[error("Database error: database '{0}' not found")]
    DatabaseNotFound(String),

    #[error("Database error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Database error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Database error: table '{0}' is not readable and writable")]
    TableAccessDenied(String),

    #[error("Database error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Database error: {values} value(s) given for {columns} column(s) in table '{table}'")]
    ValueCountMismatch {
        table: String,
        columns: usize,
        values: usize,
    },

    #[error("Database error: the '{action}()' query requires the '{clause}()' extension")]
    MissingClause {
        action: &'static str,
        clause: &'static str,
    },

    #[error("Database error: invalid schema - {0}")]
    Schema(String),

    #[error("Database error: modulo by zero in where condition")]
    DivisionByZero,

    // ========== Execution Errors ==========
    #[error("Execution error: unknown operator '{0}', expected one of < <= = >= > != <> %= %!")]
    UnknownOperator(String),

    #[error("Constraint error: duplicate value(s) ({values}) for {kind} key ({key})")]
    DuplicateKey {
        kind: &'static str,
        key: String,
        values: String,
    },

    #[error("Type error: unsupported type '{0}'")]
    UnsupportedType(String),

    // ========== Link Errors ==========
    #[error("Link error: cannot link column '{column}' - {reason}")]
    LinkTargetNotFound { column: String, reason: String },

    #[error("Link error: {on} column(s) to join through but {link} link() extension(s)")]
    LinkArity { on: usize, link: usize },

    #[error("Link error: no row of table '{table}' has {value} in column '{column}'")]
    LinkValueNotFound {
        table: String,
        column: String,
        value: String,
    },

    #[error("Link error: column '{0}' is not a link column")]
    NotALinkColumn(String),

    // ========== Query State Errors ==========
    #[error("Query state error: {0}")]
    QueryState(String),

    #[error("Result error: no result at position {0}")]
    ResultOutOfRange(usize),

    #[error("Result error: field '{0}' does not exist in the result")]
    UnknownField(String),

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: unable to lock table '{table}': {source}")]
    Lock {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: malformed table document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for JQLDB operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TableNotFound("users".to_string());
        assert_eq!(err.to_string(), "Database error: table 'users' not found");

        let err = Error::UnexpectedCharacter('@', 5);
        assert_eq!(
            err.to_string(),
            "Parse error: unexpected character '@' at position 5"
        );
    }

    #[test]
    fn test_duplicate_key_display() {
        let err = Error::DuplicateKey {
            kind: "primary",
            key: "id".to_string(),
            values: "1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Constraint error: duplicate value(s) (1) for primary key (id)"
        );
    }
}

//! JQL Token definitions
//!
//! This module defines all tokens that can appear in JQL queries.

use std::fmt;

/// JQL Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // ========== Names ==========
    /// Table, action, extension, column or keyword (`true`, `asc`, ...)
    Identifier(String),
    /// `:name` placeholder of a prepared query
    Placeholder(String),

    // ========== Literals ==========
    StringLiteral(String),
    IntegerLiteral(i64),
    FloatLiteral(f64),

    // ========== Operators ==========
    /// Raw comparison operator such as `<=` or `%!`; resolved at execution
    Operator(String),

    // ========== Punctuation ==========
    LParen,
    RParen,
    Comma,
    Dot,
    Asterisk,

    // ========== Special ==========
    Eof,
}

impl Token {
    /// Check if this token is the given identifier, ignoring case
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Identifier(s) if s.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Placeholder(s) => write!(f, ":{}", s),
            Token::StringLiteral(s) => write!(f, "'{}'", s),
            Token::IntegerLiteral(n) => write!(f, "{}", n),
            Token::FloatLiteral(n) => write!(f, "{}", n),
            Token::Operator(op) => write!(f, "{}", op),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Asterisk => write!(f, "*"),
            Token::Eof => write!(f, "end of query"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match() {
        assert!(Token::Identifier("DESC".to_string()).is_keyword("desc"));
        assert!(!Token::StringLiteral("desc".to_string()).is_keyword("desc"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::Placeholder("id".to_string()).to_string(), ":id");
        assert_eq!(Token::Operator("%!".to_string()).to_string(), "%!");
        assert_eq!(Token::Eof.to_string(), "end of query");
    }
}

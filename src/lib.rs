//! JQLDB - An embeddable JSON-file database engine written in Rust
//!
//! Each table is a single JSON document queried with JQL, a compact
//! dot-separated language: `users.select(name).where(age > 18).order(name)`.
//!
//! This library provides:
//! - JQL parsing (lexer, parser, query plan)
//! - Storage (table documents, locked file access, decode cache)
//! - Query execution (coercion, constraints, filtering, joins, results)
//! - Catalog (path resolution, table creation)

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod jql;
pub mod storage;

pub use catalog::{Catalog, Column, TableBuilder};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use executor::{ExecutionEngine, Outcome, ParamType, PreparedStatement, QueryResult};
pub use storage::Value;

//! Catalog module
//!
//! This module contains table path resolution, table creation, column
//! specifications and column types.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::{Catalog, TableBuilder};
pub use schema::Column;
pub use types::ColumnType;

//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Cell values
//! - Table documents
//! - Locked file access
//! - Decode cache

pub mod cache;
pub mod disk;
pub mod table;
pub mod value;

pub use cache::TableCache;
pub use disk::{read_table, write_table, LockedTable};
pub use table::{ColumnProperties, Row, TableData, TableProperties, ROW_ID};
pub use value::Value;

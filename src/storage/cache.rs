//! Table cache for JQLDB
//!
//! Keeps decoded table documents keyed by file path. The cache belongs to one
//! execution engine and is refreshed synchronously after every write; it only
//! stays coherent within one process and never replaces the file lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::disk::read_table;
use super::table::TableData;
use crate::error::Result;

/// Decoded tables by path
#[derive(Debug, Default)]
pub struct TableCache {
    entries: HashMap<PathBuf, TableData>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table, decoding it from disk on a miss
    pub fn get(&mut self, path: impl AsRef<Path>) -> Result<&TableData> {
        let path = path.as_ref();
        if !self.entries.contains_key(path) {
            trace!(path = %path.display(), "Table cache miss");
            let table = read_table(path)?;
            self.entries.insert(path.to_path_buf(), table);
        }
        // the entry was inserted above on a miss
        Ok(&self.entries[path])
    }

    /// Overwrite an entry with `table`, or re-read it from disk when `None`
    pub fn update(&mut self, path: impl AsRef<Path>, table: Option<TableData>) -> Result<()> {
        let path = path.as_ref();
        let table = match table {
            Some(table) => table,
            None => read_table(path)?,
        };
        trace!(path = %path.display(), "Table cache updated");
        self.entries.insert(path.to_path_buf(), table);
        Ok(())
    }

    /// Drop every entry
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Check if a path is cached
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.contains_key(path.as_ref())
    }

    /// Number of cached tables
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

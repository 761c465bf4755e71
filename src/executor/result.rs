//! Query results for JQLDB
//!
//! A [`QueryResult`] is the row set returned by `select()` and `count()`. It
//! can be indexed, iterated and serialized like a plain list of rows, and also
//! walked with a cursor (`fetch`, `fetch_object`, `fetch_record`).

use std::collections::HashMap;
use std::ops::Index;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::{Row, Value};

/// Rows produced by a query, plus metadata and a read cursor
///
/// Only the rows take part in serialization, iteration and `len()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryResult {
    rows: Vec<Row>,
    #[serde(skip)]
    query: String,
    #[serde(skip)]
    elapsed: Duration,
    #[serde(skip)]
    memory_usage: usize,
    #[serde(skip)]
    cursor: usize,
}

impl QueryResult {
    pub(crate) fn new(rows: Vec<Row>, query: &str, elapsed: Duration, memory_usage: usize) -> Self {
        Self {
            rows,
            query: query.to_string(),
            elapsed,
            memory_usage,
            cursor: 0,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a row by position
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Text of the query that produced this result
    pub fn query_string(&self) -> &str {
        &self.query
    }

    /// Time spent executing the query
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Size in bytes of the table document processed by the query
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    /// Return the row under the cursor and advance it
    pub fn fetch(&mut self) -> Option<Row> {
        let row = self.rows.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(row)
    }

    /// Like [`QueryResult::fetch`], as an attribute-access object
    pub fn fetch_object(&mut self) -> Option<ResultObject> {
        self.fetch().map(ResultObject)
    }

    /// Map the row under the cursor onto `T` and advance
    ///
    /// Every field of the row must be named in `mapping`; the renamed object
    /// is then deserialized into `T`.
    pub fn fetch_record<T: DeserializeOwned>(&mut self, mapping: &RecordMapping) -> Result<Option<T>> {
        let row = match self.rows.get(self.cursor) {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut object = serde_json::Map::with_capacity(row.len());
        for (column, value) in row {
            let field = mapping
                .fields
                .get(column)
                .ok_or_else(|| Error::UnknownField(column.clone()))?;
            object.insert(field.clone(), serde_json::to_value(value)?);
        }
        let record = serde_json::from_value(serde_json::Value::Object(object))?;

        self.cursor += 1;
        Ok(Some(record))
    }

    /// Move the cursor to `position`
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position >= self.rows.len() {
            return Err(Error::ResultOutOfRange(position));
        }
        self.cursor = position;
        Ok(())
    }

    /// Move the cursor back to the first row
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl Index<usize> for QueryResult {
    type Output = Row;

    fn index(&self, index: usize) -> &Row {
        &self.rows[index]
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Read-only view of a result row
#[derive(Debug, Clone, PartialEq)]
pub struct ResultObject(Row);

impl ResultObject {
    /// Get a field, failing if the row has no such field
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.0
            .get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Get a nested object, as produced by a join
    pub fn object(&self, name: &str) -> Result<ResultObject> {
        match self.get(name)? {
            Value::Object(fields) => Ok(ResultObject(fields.clone())),
            _ => Err(Error::UnknownField(format!("{} (not an object)", name))),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Field names in row order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Column to record-field mapping for [`QueryResult::fetch_record`]
#[derive(Debug, Clone, Default)]
pub struct RecordMapping {
    fields: HashMap<String, String>,
}

impl RecordMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a result column onto a record field
    pub fn field(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.fields.insert(column.into(), field.into());
        self
    }
}

//! Query Executor for JQLDB
//!
//! This module runs parsed plans against table files. Every query locks its
//! table file for its whole duration; write actions validate the new row set
//! in memory and only then rewrite the file.

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::coercion::Coercer;
use super::constraints::validate_uniqueness;
use super::filter::{evaluate_literal, field_value, Filter};
use super::prepared::PreparedStatement;
use super::result::QueryResult;
use crate::catalog::{Catalog, Column, ColumnType};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::jql::{parse, Action, FieldRef, Literal, OrderDirection, Param, Plan};
use crate::storage::disk::encoded_len;
use crate::storage::table::row_id;
use crate::storage::{ColumnProperties, LockedTable, Row, TableCache, TableData, Value, ROW_ID};

/// What a query produced
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Rows of a `select()` or `count()`
    Rows(QueryResult),
    /// A committed write
    Written { affected_rows: usize },
}

impl Outcome {
    pub fn rows(&self) -> Option<&QueryResult> {
        match self {
            Outcome::Rows(result) => Some(result),
            Outcome::Written { .. } => None,
        }
    }

    pub fn into_rows(self) -> Option<QueryResult> {
        match self {
            Outcome::Rows(result) => Some(result),
            Outcome::Written { .. } => None,
        }
    }

    pub fn affected_rows(&self) -> Option<usize> {
        match self {
            Outcome::Written { affected_rows } => Some(*affected_rows),
            Outcome::Rows(_) => None,
        }
    }
}

/// Execution Engine
///
/// Owns the catalog of one database and the decode cache of its tables.
pub struct ExecutionEngine {
    /// Path resolution and table creation
    catalog: Catalog,
    /// Decoded tables, refreshed after every write
    cache: TableCache,
}

impl ExecutionEngine {
    /// Create an engine over an existing database directory
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = Catalog::open(config)?;
        Ok(Self {
            catalog,
            cache: TableCache::new(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    /// Drop every cached table
    pub fn reset_cache(&mut self) {
        self.cache.reset();
    }

    /// Create a table and cache its document
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<TableData> {
        let table = self.catalog.create_table(name, columns)?;
        self.cache
            .update(self.catalog.table_path(name), Some(table.clone()))?;
        Ok(table)
    }

    /// Parse and execute a query once
    pub fn run(&mut self, query: &str) -> Result<Outcome> {
        Query::new(query)?.execute(self)
    }

    /// Parse a query holding `:name` placeholders
    pub fn prepare(&self, query: &str) -> Result<PreparedStatement> {
        PreparedStatement::new(query)
    }

    /// Execute a prepared statement once all its placeholders are bound
    pub fn execute(&mut self, statement: &mut PreparedStatement) -> Result<Outcome> {
        let plan = statement.take_plan()?;
        Query::from_plan(statement.query_string(), plan).execute(self)
    }
}

/// Lifecycle of a [`Query`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Created,
    Executing,
    Done,
    Failed,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryState::Created => "created",
            QueryState::Executing => "executing",
            QueryState::Done => "done",
            QueryState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A single-shot query
#[derive(Debug, Clone)]
pub struct Query {
    text: String,
    plan: Plan,
    state: QueryState,
}

impl Query {
    /// Parse a query
    pub fn new(text: &str) -> Result<Self> {
        Ok(Self::from_plan(text, parse(text)?))
    }

    pub fn from_plan(text: &str, plan: Plan) -> Self {
        Self {
            text: text.to_string(),
            plan,
            state: QueryState::Created,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Execute the query; a query runs at most once
    pub fn execute(&mut self, engine: &mut ExecutionEngine) -> Result<Outcome> {
        if self.state != QueryState::Created {
            return Err(Error::QueryState(format!(
                "the query is {} and cannot be executed again",
                self.state
            )));
        }

        self.state = QueryState::Executing;
        let outcome = self.run(engine);
        self.state = match &outcome {
            Ok(_) => QueryState::Done,
            Err(e) => {
                if self.plan.action.is_write() {
                    warn!(
                        table = %self.plan.table,
                        action = %self.plan.action,
                        error = %e,
                        "Rejected write"
                    );
                }
                QueryState::Failed
            }
        };
        outcome
    }

    fn run(&self, engine: &mut ExecutionEngine) -> Result<Outcome> {
        if let Some(name) = self.plan.placeholders().first() {
            return Err(Error::QueryState(format!(
                "no value bound for the placeholder ':{}'",
                name
            )));
        }

        let started = Instant::now();
        let path = engine.catalog.table_path(&self.plan.table);
        // held until the end of this function, released on drop
        let mut locked = LockedTable::open(&path)?;
        let table = engine.cache.get(&path)?.clone();

        debug!(
            table = %self.plan.table,
            action = %self.plan.action,
            rows = table.row_count(),
            "Executing query"
        );

        let mut execution = Execution {
            plan: &self.plan,
            catalog: &engine.catalog,
            table,
        };

        let affected_rows = match self.plan.action {
            Action::Select | Action::Count => {
                let memory_usage = encoded_len(&execution.table)?;
                let rows = if self.plan.action == Action::Count {
                    execution.count()?
                } else {
                    execution.select()?
                };
                return Ok(Outcome::Rows(QueryResult::new(
                    rows,
                    &self.text,
                    started.elapsed(),
                    memory_usage,
                )));
            }
            Action::Insert => execution.insert()?,
            Action::Replace => execution.replace()?,
            Action::Update => execution.update()?,
            Action::Delete => execution.delete()?,
            Action::Truncate => execution.truncate(),
        };

        let table = execution.table;
        locked.write(&table)?;
        engine.cache.update(&path, Some(table))?;

        info!(
            table = %self.plan.table,
            action = %self.plan.action,
            affected_rows,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Committed write"
        );
        Ok(Outcome::Written { affected_rows })
    }
}

/// One action running against a working copy of a table
struct Execution<'a> {
    plan: &'a Plan,
    catalog: &'a Catalog,
    table: TableData,
}

impl<'a> Execution<'a> {
    fn name(&self) -> &'a str {
        &self.plan.table
    }

    fn filter(&self) -> Result<Filter> {
        Filter::compile(&self.plan.where_groups(), self.name(), &self.table)
    }

    fn check_column(&self, column: &str) -> Result<()> {
        if self.table.has_column(column) {
            Ok(())
        } else {
            Err(Error::ColumnNotFound(
                column.to_string(),
                self.name().to_string(),
            ))
        }
    }

    // ========== Select ==========

    fn select(&self) -> Result<Vec<Row>> {
        let mut rows: Vec<Row> = self.table.data.values().cloned().collect();

        if let Some((column, direction)) = self.plan.order() {
            self.check_column(column)?;
            rows.sort_by(|a, b| {
                let ordering = cell(a, column).compare(cell(b, column));
                match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                }
            });
        }

        let mut rows = self.filter()?.apply(rows)?;

        if let Some((offset, count)) = self.plan.limit() {
            rows = rows.into_iter().skip(offset).take(count).collect();
        }

        self.join(&mut rows)?;
        self.project(rows)
    }

    /// Replace each `on()` column by an object built from the linked row
    fn join(&self, rows: &mut [Row]) -> Result<()> {
        let on = self.plan.on_columns();
        let links = self.plan.link_columns();
        if on.len() != links.len() {
            return Err(Error::LinkArity {
                on: on.len(),
                link: links.len(),
            });
        }

        for (column, requested) in on.into_iter().zip(links) {
            let properties = self.table.require_column(self.name(), column)?;
            let target_name = match properties.parsed_type()? {
                ColumnType::Link { table, .. } => table,
                _ => return Err(Error::NotALinkColumn(column.to_string())),
            };
            let target = self.catalog.read_table(&target_name)?;

            let fields = if requested.iter().any(|c| c == "*") {
                target.visible_columns()
            } else {
                if let Some(missing) = requested.iter().find(|c| !target.has_column(c)) {
                    return Err(Error::ColumnNotFound(missing.clone(), target_name));
                }
                requested.to_vec()
            };
            debug!(
                column = %column,
                target = %target_name,
                fields = fields.len(),
                "Joining through link column"
            );

            for row in rows.iter_mut() {
                let joined = match row.get(column) {
                    Some(Value::String(link_id)) => target.data.get(link_id).map(|linked| {
                        Value::Object(
                            fields
                                .iter()
                                .map(|f| (f.clone(), cell(linked, f).clone()))
                                .collect(),
                        )
                    }),
                    _ => None,
                };
                if let Some(slot) = row.get_mut(column) {
                    *slot = joined.unwrap_or(Value::Null);
                }
            }
        }
        Ok(())
    }

    fn project(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        if self.plan.params.iter().any(|p| matches!(p, Param::LastInsertId)) {
            let mut row = Row::new();
            row.insert(
                "last_insert_id".to_string(),
                Value::Integer(self.table.properties.last_insert_id),
            );
            return Ok(vec![row]);
        }

        let fields = self.requested_fields()?;
        let aliases = self.plan.aliases().unwrap_or(&[]);
        let keys: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(i, (key, _))| match aliases.get(i) {
                Some(alias) if !alias.eq_ignore_ascii_case("null") => alias.clone(),
                _ => key.clone(),
            })
            .collect();

        Ok(rows
            .iter()
            .map(|row| {
                keys.iter()
                    .zip(&fields)
                    .map(|(key, (_, field))| (key.clone(), field_value(row, field)))
                    .collect()
            })
            .collect())
    }

    /// Expand the action parameters to (result key, field) pairs
    fn requested_fields(&self) -> Result<Vec<(String, FieldRef)>> {
        let mut fields = Vec::new();
        for param in &self.plan.params {
            match param {
                Param::All => fields.extend(
                    self.table
                        .visible_columns()
                        .into_iter()
                        .map(|c| (c.clone(), FieldRef::column(c))),
                ),
                Param::Field(field) => {
                    self.check_column(&field.column)?;
                    fields.push((field.to_string(), field.clone()));
                }
                Param::LastInsertId => {}
                Param::Value(literal) => {
                    return Err(Error::Parse(format!("'{}' is not a column", literal)))
                }
            }
        }
        Ok(fields)
    }

    // ========== Count ==========

    fn count(&self) -> Result<Vec<Row>> {
        let rows = self
            .filter()?
            .apply(self.table.data.values().cloned().collect())?;
        let fields = self.requested_fields()?;

        let label = match self.plan.aliases().and_then(|a| a.first()) {
            Some(alias) => alias.clone(),
            None => format!(
                "count({})",
                self.plan
                    .params
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        };

        let group = match self.plan.group() {
            Some(group) => group,
            None => {
                // largest number of non-null values among the requested fields
                let tally = fields
                    .iter()
                    .map(|(_, field)| {
                        rows.iter()
                            .filter(|row| !field_value(row, field).is_null())
                            .count()
                    })
                    .max()
                    .unwrap_or(0);
                let mut row = Row::new();
                row.insert(label, Value::Integer(tally as i64));
                return Ok(vec![row]);
            }
        };
        self.check_column(group)?;

        let mut buckets: IndexMap<Value, Vec<&Row>> = IndexMap::new();
        for row in &rows {
            buckets.entry(cell(row, group).clone()).or_default().push(row);
        }

        Ok(buckets
            .into_iter()
            .map(|(value, members)| {
                let mut row = Row::new();
                row.insert(label.clone(), Value::Integer(members.len() as i64));
                row.insert(group.to_string(), value);
                row
            })
            .collect())
    }

    // ========== Insert / Replace ==========

    /// Columns receiving values: the `in()` list or every declared column
    fn target_columns(&self) -> Result<Vec<(String, ColumnProperties)>> {
        let names = match self.plan.in_columns() {
            Some(columns) => columns.to_vec(),
            None => self.table.visible_columns(),
        };
        names
            .into_iter()
            .map(|name| {
                let properties = self.table.require_column(self.name(), &name)?.clone();
                Ok((name, properties))
            })
            .collect()
    }

    /// The action values followed by every `and()` batch
    fn value_batches(&self, width: usize) -> Result<Vec<Vec<&'a Literal>>> {
        let plan: &'a Plan = self.plan;
        let first = plan
            .params
            .iter()
            .map(|p| match p {
                Param::Value(literal) => Ok(literal),
                other => Err(Error::Parse(format!("'{}' is not a value", other))),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut batches = vec![first];
        batches.extend(plan.and_batches().into_iter().map(|b| b.iter().collect()));

        for batch in &batches {
            if batch.len() != width {
                return Err(Error::ValueCountMismatch {
                    table: plan.table.clone(),
                    columns: width,
                    values: batch.len(),
                });
            }
        }
        Ok(batches)
    }

    fn insert(&mut self) -> Result<usize> {
        let columns = self.target_columns()?;
        let batches = self.value_batches(columns.len())?;

        let last_insert_id = self.table.properties.last_insert_id;
        let auto_increment = self.table.auto_increment_column().map(str::to_string);
        let base = self
            .table
            .properties
            .last_valid_row_id
            .max(self.table.max_row_id());
        let mut counter = last_insert_id;
        let mut coercer = Coercer::new(self.catalog);
        let mut inserted = Vec::with_capacity(batches.len());

        for (k, batch) in batches.iter().enumerate() {
            let mut row = Row::new();
            row.insert(ROW_ID.to_string(), Value::Integer(base + k as i64 + 1));

            for ((column, properties), literal) in columns.iter().zip(batch) {
                let raw = evaluate_literal(literal, last_insert_id)?;
                row.insert(column.clone(), coercer.coerce(&raw, properties)?);
            }
            for (column, properties) in &self.table.properties.columns {
                if !row.contains_key(column) {
                    row.insert(column.clone(), coercer.coerce(&Value::Null, properties)?);
                }
            }

            if let Some(column) = &auto_increment {
                let given = cell(&row, column).clone();
                if given.is_null() || given.to_integer() == 0 {
                    counter += 1;
                    row.insert(column.clone(), Value::Integer(counter));
                } else {
                    counter = counter.max(given.to_integer());
                }
            }
            inserted.push(row);
        }

        validate_uniqueness(
            self.table.data.values().chain(inserted.iter()),
            &self.table.properties.primary_keys,
            &self.table.properties.unique_keys,
        )?;

        let affected = inserted.len();
        for row in inserted {
            let key = self.table.next_link_id();
            self.table.data.insert(key, row);
        }
        self.table.properties.last_valid_row_id = self.table.max_row_id();
        self.settle(counter);
        Ok(affected)
    }

    /// Overwrite the first rows, in storage order, one per value batch
    fn replace(&mut self) -> Result<usize> {
        let columns = self.target_columns()?;
        let batches = self.value_batches(columns.len())?;

        let last_insert_id = self.table.properties.last_insert_id;
        let auto_increment = self.table.auto_increment_column().map(str::to_string);
        let mut coercer = Coercer::new(self.catalog);

        let mut changes = Vec::with_capacity(batches.len());
        for batch in &batches {
            let mut change = Vec::with_capacity(columns.len());
            for ((column, properties), literal) in columns.iter().zip(batch) {
                let raw = evaluate_literal(literal, last_insert_id)?;
                if raw.is_null() && auto_increment.as_deref() == Some(column.as_str()) {
                    continue;
                }
                change.push((column.clone(), coercer.coerce(&raw, properties)?));
            }
            changes.push(change);
        }

        let mut data = self.table.data.clone();
        let affected = changes.len().min(data.len());
        for (row, change) in data.values_mut().zip(changes) {
            for (column, value) in change {
                row.insert(column, value);
            }
        }

        validate_uniqueness(
            data.values(),
            &self.table.properties.primary_keys,
            &self.table.properties.unique_keys,
        )?;

        self.table.data = data;
        self.settle(last_insert_id);
        Ok(affected)
    }

    // ========== Update ==========

    fn update(&mut self) -> Result<usize> {
        let values = self.plan.with_values().ok_or(Error::MissingClause {
            action: "update",
            clause: "with",
        })?;

        let mut columns = Vec::new();
        for param in &self.plan.params {
            match param {
                Param::All => columns.extend(self.table.visible_columns()),
                Param::Field(field) if field.function.is_none() => {
                    columns.push(field.column.clone())
                }
                other => {
                    return Err(Error::Parse(format!(
                        "'{}' cannot be updated",
                        other
                    )))
                }
            }
        }
        if columns.len() != values.len() {
            return Err(Error::ValueCountMismatch {
                table: self.name().to_string(),
                columns: columns.len(),
                values: values.len(),
            });
        }

        let last_insert_id = self.table.properties.last_insert_id;
        let mut coercer = Coercer::new(self.catalog);
        let mut assignments = Vec::with_capacity(columns.len());
        for (column, literal) in columns.into_iter().zip(values) {
            let properties = self.table.require_column(self.name(), &column)?;
            let raw = evaluate_literal(literal, last_insert_id)?;
            let value = coercer.coerce(&raw, properties)?;
            assignments.push((column, value));
        }

        let filter = self.filter()?;
        let mut data = self.table.data.clone();
        let mut affected = 0;
        for row in data.values_mut() {
            if filter.matches(row)? {
                for (column, value) in &assignments {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }

        validate_uniqueness(
            data.values(),
            &self.table.properties.primary_keys,
            &self.table.properties.unique_keys,
        )?;

        self.table.data = data;
        self.settle(last_insert_id);
        Ok(affected)
    }

    // ========== Delete / Truncate ==========

    fn delete(&mut self) -> Result<usize> {
        let filter = self.filter()?;

        let mut doomed = HashSet::new();
        let mut lowest: Option<i64> = None;
        for (key, row) in &self.table.data {
            if filter.matches(row)? {
                doomed.insert(key.clone());
                let id = row_id(row);
                lowest = Some(lowest.map_or(id, |l| l.min(id)));
            }
        }

        self.table.data.retain(|key, _| !doomed.contains(key));
        self.table.normalize();
        if let Some(lowest) = lowest {
            self.table.properties.last_valid_row_id = (lowest - 1).max(self.table.max_row_id());
        }
        Ok(doomed.len())
    }

    fn truncate(&mut self) -> usize {
        let affected = self.table.row_count();
        self.table.data.clear();
        self.table.properties.last_insert_id = 0;
        self.table.properties.last_valid_row_id = 0;
        affected
    }

    /// Reorder rows and raise `last_insert_id` to the auto-increment maximum
    fn settle(&mut self, floor: i64) {
        self.table.normalize();
        self.table.refresh_last_insert_id();
        let last = &mut self.table.properties.last_insert_id;
        *last = (*last).max(floor);
    }
}

fn cell<'r>(row: &'r Row, column: &str) -> &'r Value {
    row.get(column).unwrap_or(&Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableBuilder;
    use crate::executor::ParamType;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ExecutionEngine) {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new().storage_path(dir.path()).database("shop");
        Catalog::new(config.clone()).create_database().unwrap();
        let engine = ExecutionEngine::new(config).unwrap();
        (dir, engine)
    }

    fn people(engine: &mut ExecutionEngine) {
        engine
            .create_table(
                "people",
                vec![
                    Column::new("id", "int").auto_increment(true),
                    Column::new("name", "string").max_length(10),
                    Column::new("age", "int"),
                ],
            )
            .unwrap();
    }

    fn select(engine: &mut ExecutionEngine, query: &str) -> QueryResult {
        engine.run(query).unwrap().into_rows().unwrap()
    }

    #[test]
    fn test_missing_database() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new().storage_path(dir.path()).database("nope");
        assert!(matches!(
            ExecutionEngine::new(config),
            Err(Error::DatabaseNotFound(_))
        ));
    }

    #[test]
    fn test_query_runs_once() {
        let (_dir, mut engine) = setup();
        people(&mut engine);

        let mut query = Query::new("people.select(*)").unwrap();
        assert_eq!(query.state(), QueryState::Created);
        query.execute(&mut engine).unwrap();
        assert_eq!(query.state(), QueryState::Done);
        assert!(matches!(
            query.execute(&mut engine),
            Err(Error::QueryState(_))
        ));

        let mut failing = Query::new("ghosts.select(*)").unwrap();
        assert!(matches!(
            failing.execute(&mut engine),
            Err(Error::TableNotFound(_))
        ));
        assert_eq!(failing.state(), QueryState::Failed);
    }

    #[test]
    fn test_insert_counters() {
        let (_dir, mut engine) = setup();
        people(&mut engine);

        let outcome = engine
            .run("people.insert(null, 'alice', 30).and(0, 'bob', 25).and(10, 'carol', 41)")
            .unwrap();
        assert_eq!(outcome.affected_rows(), Some(3));

        let table = engine.catalog().read_table("people").unwrap();
        assert_eq!(table.properties.last_insert_id, 10);
        assert_eq!(table.properties.last_valid_row_id, 3);
        assert_eq!(table.properties.last_link_id, 3);
        let ids: Vec<_> = table.data.values().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(1), Value::Integer(2), Value::Integer(10)]);

        engine.run("people.insert(null, 'dave', 50)").unwrap();
        let result = select(&mut engine, "people.select(last_insert_id)");
        assert_eq!(result[0]["last_insert_id"], Value::Integer(11));
    }

    #[test]
    fn test_insert_with_in_list_fills_missing_columns() {
        let (_dir, mut engine) = setup();
        people(&mut engine);

        engine
            .run("people.insert('a very long name', 3).in(name, age)")
            .unwrap();
        let result = select(&mut engine, "people.select(*)");
        assert_eq!(result[0]["id"], Value::Integer(1));
        assert_eq!(result[0]["name"], Value::from("a very lon"));
        assert!(!result[0].contains_key(ROW_ID));

        assert!(matches!(
            engine.run("people.insert('x').in(height)"),
            Err(Error::ColumnNotFound(..))
        ));
        assert!(matches!(
            engine.run("people.insert('x', 1)"),
            Err(Error::ValueCountMismatch { columns: 3, values: 2, .. })
        ));
    }

    #[test]
    fn test_select_projection_and_aliases() {
        let (_dir, mut engine) = setup();
        people(&mut engine);
        engine
            .run("people.insert(null, 'alice', 30).and(null, 'bob', 25)")
            .unwrap();

        let result = select(&mut engine, "people.select(name, upperCase(name), age).as(null, shout)");
        assert_eq!(
            result[1].keys().collect::<Vec<_>>(),
            vec!["name", "shout", "age"]
        );
        assert_eq!(result[1]["shout"], Value::from("BOB"));

        let result = select(&mut engine, "people.select(name).order(age, desc).limit(1)");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["name"], Value::from("alice"));

        assert!(matches!(
            engine.run("people.select(height)"),
            Err(Error::ColumnNotFound(..))
        ));
    }

    #[test]
    fn test_update_and_replace() {
        let (_dir, mut engine) = setup();
        people(&mut engine);
        engine
            .run("people.insert(null, 'alice', 30).and(null, 'bob', 25)")
            .unwrap();

        assert!(matches!(
            engine.run("people.update(age)"),
            Err(Error::MissingClause { .. })
        ));
        let outcome = engine
            .run("people.update(age).with(26).where(name = 'bob')")
            .unwrap();
        assert_eq!(outcome.affected_rows(), Some(1));

        // a null auto-increment value keeps the stored one
        engine.run("people.replace(null, 'zed', 99)").unwrap();
        let result = select(&mut engine, "people.select(*)");
        assert_eq!(result[0]["id"], Value::Integer(1));
        assert_eq!(result[0]["name"], Value::from("zed"));
        assert_eq!(result[1]["age"], Value::Integer(26));

        // update cannot make two auto-increment values equal
        assert!(matches!(
            engine.run("people.update(id).with(7)"),
            Err(Error::DuplicateKey { .. })
        ));
        let result = select(&mut engine, "people.select(id)");
        assert_eq!(result[1]["id"], Value::Integer(2));
    }

    #[test]
    fn test_delete_lowers_last_valid_row_id() {
        let (_dir, mut engine) = setup();
        people(&mut engine);
        engine
            .run("people.insert(null, 'a', 1).and(null, 'b', 2).and(null, 'c', 3).and(null, 'd', 4)")
            .unwrap();

        let outcome = engine.run("people.delete().where(age >= 3)").unwrap();
        assert_eq!(outcome.affected_rows(), Some(2));
        let table = engine.catalog().read_table("people").unwrap();
        assert_eq!(table.properties.last_valid_row_id, 2);
        assert_eq!(table.properties.last_insert_id, 4);

        engine.run("people.insert(null, 'e', 5)").unwrap();
        let table = engine.catalog().read_table("people").unwrap();
        let last = table.data.values().last().unwrap();
        assert_eq!(last[ROW_ID], Value::Integer(3));
        assert_eq!(last["id"], Value::Integer(5));

        // removing a middle row keeps row identities above the survivors
        engine.run("people.delete().where(name = 'b')").unwrap();
        let table = engine.catalog().read_table("people").unwrap();
        assert_eq!(table.properties.last_valid_row_id, 3);
    }

    #[test]
    fn test_count_with_group() {
        let (_dir, mut engine) = setup();
        people(&mut engine);
        engine
            .run("people.insert(null, 'a', 30).and(null, 'b', 25).and(null, 'c', 30).and(null, null, 30)")
            .unwrap();

        // every row of a bucket counts, null names included
        let result = select(&mut engine, "people.count(name).group(age)");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["count(name)"], Value::Integer(3));
        assert_eq!(result[0]["age"], Value::Integer(30));
        assert_eq!(result[1]["count(name)"], Value::Integer(1));

        let result = select(&mut engine, "people.count(name)");
        assert_eq!(result[0]["count(name)"], Value::Integer(3));

        let result = select(&mut engine, "people.count(*).as(total).where(age = 30)");
        assert_eq!(result[0]["total"], Value::Integer(3));
    }

    #[test]
    fn test_where_errors_even_on_empty_table() {
        let (_dir, mut engine) = setup();
        people(&mut engine);

        assert!(matches!(
            engine.run("people.select(*).where(age ~ 3)"),
            Err(Error::UnexpectedCharacter('~', _))
        ));
        assert!(matches!(
            engine.run("people.select(*).where(age =! 3)"),
            Err(Error::UnknownOperator(_))
        ));
        assert!(matches!(
            engine.run("people.delete().where(height = 3)"),
            Err(Error::ColumnNotFound(..))
        ));
    }

    #[test]
    fn test_prepared_statement() {
        let (_dir, mut engine) = setup();
        people(&mut engine);

        let mut insert = engine.prepare("people.insert(null, :name, :age)").unwrap();
        insert
            .bind_value(":name", "alice", ParamType::String)
            .unwrap();
        assert!(matches!(
            engine.execute(&mut insert),
            Err(Error::QueryState(_))
        ));
        insert
            .bind_value(":age", 30, ParamType::Integer)
            .unwrap();
        assert_eq!(engine.execute(&mut insert).unwrap().affected_rows(), Some(1));
        assert!(matches!(
            engine.execute(&mut insert),
            Err(Error::QueryState(_))
        ));

        assert!(matches!(
            engine.run("people.select(*).where(name = :name)"),
            Err(Error::QueryState(_))
        ));
    }

    #[test]
    fn test_builder_created_table_is_queryable() {
        let (_dir, mut engine) = setup();
        TableBuilder::new("tags")
            .unique("label", "string")
            .build(engine.catalog())
            .unwrap();

        engine.run("tags.insert('red').and('')").unwrap();
        engine.run("tags.insert('')").unwrap();
        assert!(matches!(
            engine.run("tags.insert('red')"),
            Err(Error::DuplicateKey { kind: "unique", .. })
        ));
        let result = select(&mut engine, "tags.count(*)");
        assert_eq!(result[0]["count(*)"], Value::Integer(3));
    }
}

//! System Catalog for JQLDB
//!
//! This module resolves where databases and tables live on disk and creates
//! new tables from column specifications.

use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{debug, info};

use super::schema::Column;
use super::types::ColumnType;
use crate::config::{EngineConfig, TABLE_EXTENSION};
use crate::error::{Error, Result};
use crate::storage::{read_table, write_table, ColumnProperties, TableData, ROW_ID};

/// System Catalog - resolves database and table files
#[derive(Debug, Clone)]
pub struct Catalog {
    config: EngineConfig,
}

impl Catalog {
    /// Create a catalog over a configuration without touching the disk
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Create a catalog whose database directory must already exist
    pub fn open(config: EngineConfig) -> Result<Self> {
        let catalog = Self::new(config);
        if catalog.config.database.is_empty() || !catalog.database_path().is_dir() {
            return Err(Error::DatabaseNotFound(catalog.config.database.clone()));
        }
        Ok(catalog)
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Directory of the database
    pub fn database_path(&self) -> PathBuf {
        self.config.database_dir()
    }

    /// File of a table
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.config.table_path(name)
    }

    /// Create the database directory (and its server directory)
    pub fn create_database(&self) -> Result<()> {
        if self.config.database.is_empty() {
            return Err(Error::DatabaseNotFound(String::new()));
        }
        let path = self.database_path();
        fs::create_dir_all(&path)?;
        info!(database = %self.config.database, path = %path.display(), "Created database");
        Ok(())
    }

    /// Check if a database of the configured server exists
    pub fn database_exists(&self, name: &str) -> bool {
        !name.is_empty() && self.config.server_dir().join(name).is_dir()
    }

    /// List the databases of the configured server, sorted
    ///
    /// A server directory that was never created holds no database.
    pub fn list_databases(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.config.server_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut databases = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                databases.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        databases.sort();
        Ok(databases)
    }

    /// Check if a table exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.table_path(name).is_file()
    }

    /// List all table names, sorted
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let dir = self.database_path();
        let entries = fs::read_dir(&dir)
            .map_err(|_| Error::DatabaseNotFound(self.config.database.clone()))?;

        let mut tables = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TABLE_EXTENSION) {
                if let Some(stem) = path.file_stem() {
                    tables.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        tables.sort();
        Ok(tables)
    }

    /// Read a table without locking it
    pub fn read_table(&self, name: &str) -> Result<TableData> {
        read_table(self.table_path(name))
    }

    /// Create a new table
    ///
    /// Column properties are normalized before the file is written:
    /// - auto-increment forces `int`, `unique_key` and `not_null`
    /// - primary and unique keys force `not_null`
    /// - link columns drop `default` and `max_length`
    /// - defaults are converted to the declared type
    pub fn create_table(&self, name: &str, columns: Vec<Column>) -> Result<TableData> {
        if name.is_empty() {
            return Err(Error::Schema("table name is empty".to_string()));
        }
        let path = self.table_path(name);
        if path.exists() {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }
        if !self.database_path().is_dir() {
            return Err(Error::DatabaseNotFound(self.config.database.clone()));
        }

        let mut properties: IndexMap<String, ColumnProperties> = IndexMap::new();
        let mut auto_increment: Option<String> = None;

        for column in columns {
            if column.name.is_empty() || column.name == ROW_ID {
                return Err(Error::Schema(format!(
                    "'{}' is not a valid column name",
                    column.name
                )));
            }
            if properties.contains_key(&column.name) {
                return Err(Error::Schema(format!(
                    "column '{}' is declared twice",
                    column.name
                )));
            }

            let mut props = column.raw_properties();
            if props.auto_increment {
                if let Some(existing) = &auto_increment {
                    return Err(Error::Schema(format!(
                        "only one auto_increment column is allowed, found '{}' and '{}'",
                        existing, column.name
                    )));
                }
                auto_increment = Some(column.name.clone());
                props.column_type = ColumnType::Integer.to_string();
                props.unique_key = true;
                props.not_null = true;
            }
            if props.primary_key || props.unique_key {
                props.not_null = true;
            }

            let column_type = props.parsed_type()?;
            match &column_type {
                ColumnType::Link {
                    table,
                    column: target,
                } => {
                    self.check_link_target(&column.name, table, target)?;
                    props.default = None;
                    props.max_length = None;
                }
                _ => {
                    props.default = props
                        .default
                        .take()
                        .map(|d| column_type.convert(&d, props.max_length));
                }
            }
            props.column_type = column_type.to_string();

            debug!(table = name, column = %column.name, column_type = %props.column_type, "Declared column");
            properties.insert(column.name, props);
        }

        let table = TableData::new(properties);
        write_table(&path, &table)?;
        info!(table = name, columns = table.properties.columns.len(), "Created table");
        Ok(table)
    }

    /// A link must point at an existing primary or unique key column
    fn check_link_target(&self, column: &str, table: &str, target: &str) -> Result<()> {
        let fail = |reason: String| Error::LinkTargetNotFound {
            column: column.to_string(),
            reason,
        };

        let path = self.table_path(table);
        if !path.is_file() {
            return Err(fail(format!("table '{}' does not exist", table)));
        }
        let linked = read_table(&path)?;
        if !linked.has_column(target) || target == ROW_ID {
            return Err(fail(format!(
                "column '{}' does not exist in table '{}'",
                target, table
            )));
        }
        let keys = &linked.properties;
        if !keys.primary_keys.iter().any(|k| k == target)
            && !keys.unique_keys.iter().any(|k| k == target)
        {
            return Err(fail(format!(
                "column '{}' is neither a primary nor a unique key of table '{}'",
                target, table
            )));
        }
        Ok(())
    }
}

/// Builder for creating tables with a fluent API
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
}

impl TableBuilder {
    /// Start building a new table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a fully specified column
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a nullable column
    pub fn column(self, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        self.with_column(Column::new(name, column_type))
    }

    /// Add a NOT NULL column
    pub fn column_not_null(self, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        self.with_column(Column::new(name, column_type).not_null(true))
    }

    /// Add an auto-increment column
    pub fn auto_increment(self, name: impl Into<String>) -> Self {
        self.with_column(Column::new(name, "int").auto_increment(true))
    }

    /// Add a primary key column
    pub fn primary_key(self, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        self.with_column(Column::new(name, column_type).primary_key(true))
    }

    /// Add a unique column
    pub fn unique(self, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        self.with_column(Column::new(name, column_type).unique_key(true))
    }

    /// Add a column linked to `table.column`
    pub fn link(self, name: impl Into<String>, table: &str, column: &str) -> Self {
        self.with_column(Column::new(name, format!("link({}.{})", table, column)))
    }

    /// Create the table through the catalog
    pub fn build(self, catalog: &Catalog) -> Result<TableData> {
        catalog.create_table(&self.name, self.columns)
    }
}

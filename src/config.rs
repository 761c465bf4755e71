//! Engine configuration for JQLDB
//!
//! Tables live under `<storage>/servers/<server>/<database>/<table>.jdbt`.

use std::path::PathBuf;

/// Default storage root
pub const DEFAULT_STORAGE: &str = "./jqldb_data";

/// Default server directory name
pub const DEFAULT_SERVER: &str = "localhost";

/// Table file extension
pub const TABLE_EXTENSION: &str = "jdbt";

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Root directory holding every server
    pub storage_path: PathBuf,
    /// Server directory name
    pub server: String,
    /// Database directory name
    pub database: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE),
            server: DEFAULT_SERVER.to_string(),
            database: String::new(),
        }
    }
}

impl EngineConfig {
    /// Create a new engine config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage root
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Set the server name
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Set the database name
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Directory of the configured server
    pub fn server_dir(&self) -> PathBuf {
        self.storage_path.join("servers").join(&self.server)
    }

    /// Directory of the configured database
    pub fn database_dir(&self) -> PathBuf {
        self.server_dir().join(&self.database)
    }

    /// File of a table in the configured database
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.database_dir()
            .join(format!("{}.{}", table, TABLE_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_paths() {
        let config = EngineConfig::new()
            .storage_path("/data")
            .server("srv")
            .database("shop");

        assert_eq!(config.server_dir(), PathBuf::from("/data/servers/srv"));
        assert_eq!(config.database_dir(), PathBuf::from("/data/servers/srv/shop"));
        assert_eq!(
            config.table_path("orders"),
            PathBuf::from("/data/servers/srv/shop/orders.jdbt")
        );
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert!(config.database.is_empty());
    }
}

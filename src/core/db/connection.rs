/// Connection Registry
///
/// This module owns the named driver handles and tracks which one is current.
/// The registry is a plain value owned by a [`crate::Database`]; there is no
/// process-wide connection state and no locking. A registry serves one
/// thread at a time.
use crate::config::ConnectionConfig;
use crate::core::{FluentError, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::{debug, info};

/// Name selected by a fresh registry.
pub const DEFAULT_CONNECTION: &str = "default";

/// Named connections plus the current selection.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
    current: String,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Creates an empty registry with `"default"` selected.
    pub fn new() -> Self {
        ConnectionRegistry {
            connections: HashMap::new(),
            current: DEFAULT_CONNECTION.to_string(),
        }
    }

    /// Registers an already opened handle under `name`.
    ///
    /// # Errors
    ///
    /// `FluentError::ConnectionAlreadyExists` if the name is taken.
    pub fn add(&mut self, name: &str, connection: Connection) -> Result<()> {
        if self.connections.contains_key(name) {
            return Err(FluentError::ConnectionAlreadyExists(name.to_string()));
        }
        register_compat_functions(&connection)?;
        self.connections.insert(name.to_string(), connection);
        info!(connection = name, "registered connection");
        Ok(())
    }

    /// Opens the database described by `config` and registers it.
    ///
    /// Each configured pragma is applied before registration, e.g.
    /// `foreign_keys = ON`.
    pub fn open(&mut self, config: &ConnectionConfig) -> Result<()> {
        if self.connections.contains_key(&config.name) {
            return Err(FluentError::ConnectionAlreadyExists(config.name.clone()));
        }
        let connection = Connection::open(&config.path)?;
        for pragma in &config.pragmas {
            debug!(connection = %config.name, pragma = %pragma, "applying pragma");
            // Some pragmas report their new value as a row, others return nothing.
            connection
                .query_row(&format!("PRAGMA {pragma}"), [], |_| Ok(()))
                .optional()?;
        }
        self.add(&config.name, connection)
    }

    /// Makes `name` the current connection.
    pub fn set_current(&mut self, name: &str) -> Result<()> {
        if !self.connections.contains_key(name) {
            return Err(FluentError::ConnectionNotFound(name.to_string()));
        }
        self.current = name.to_string();
        Ok(())
    }

    pub fn current_name(&self) -> &str {
        &self.current
    }

    /// The current connection.
    ///
    /// # Errors
    ///
    /// `FluentError::NoActiveConnection` if the selected name is no longer
    /// registered (e.g. after disconnect).
    pub fn current(&self) -> Result<&Connection> {
        self.connections
            .get(&self.current)
            .ok_or_else(|| FluentError::NoActiveConnection(self.current.clone()))
    }

    pub fn get(&self, name: &str) -> Result<&Connection> {
        self.connections
            .get(name)
            .ok_or_else(|| FluentError::ConnectionNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Closes and removes one connection. The current selection is left
    /// untouched, so disconnecting the current connection makes `current()`
    /// fail until another one is selected.
    pub fn disconnect(&mut self, name: &str) -> Result<()> {
        let connection = self
            .connections
            .remove(name)
            .ok_or_else(|| FluentError::ConnectionNotFound(name.to_string()))?;
        connection.close().map_err(|(_, e)| FluentError::Database(e))?;
        info!(connection = name, "disconnected");
        Ok(())
    }

    /// Closes and removes every connection.
    pub fn disconnect_all(&mut self) -> Result<()> {
        for name in self.names() {
            self.disconnect(&name)?;
        }
        Ok(())
    }

    /// Round-trips a trivial statement on the current connection.
    pub fn ping(&self) -> Result<bool> {
        let one: i64 = self.current()?.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(one == 1)
    }
}

/// Registers MySQL-compatible helpers that compiled statements may reference:
/// `rand()` returns a float in `[0, 1)`.
fn register_compat_functions(connection: &Connection) -> Result<()> {
    connection.create_scalar_function("rand", 0, FunctionFlags::SQLITE_UTF8, |_| {
        // Low 53 bits of a v4 UUID; the version and variant bits sit above them.
        let bits = uuid::Uuid::new_v4().as_u128() & ((1u128 << 53) - 1);
        Ok(bits as f64 / (1u64 << 53) as f64)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config(name: &str) -> ConnectionConfig {
        ConnectionConfig {
            name: name.to_string(),
            path: ":memory:".to_string(),
            pragmas: vec!["foreign_keys = ON".to_string()],
        }
    }

    #[test]
    fn test_registry_initialization() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.current_name(), DEFAULT_CONNECTION);
        assert!(matches!(
            registry.current(),
            Err(FluentError::NoActiveConnection(_))
        ));
    }

    #[test]
    fn test_duplicate_connection_is_rejected() {
        let mut registry = ConnectionRegistry::new();
        registry.add("x", Connection::open_in_memory().unwrap()).unwrap();

        let err = registry
            .add("x", Connection::open_in_memory().unwrap())
            .unwrap_err();
        assert!(matches!(err, FluentError::ConnectionAlreadyExists(name) if name == "x"));
    }

    #[test]
    fn test_set_unknown_connection() {
        let mut registry = ConnectionRegistry::new();
        let err = registry.set_current("missing").unwrap_err();
        assert!(matches!(err, FluentError::ConnectionNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_disconnect_current() {
        let mut registry = ConnectionRegistry::new();
        registry.open(&memory_config(DEFAULT_CONNECTION)).unwrap();
        registry.open(&memory_config("reports")).unwrap();
        assert!(registry.ping().unwrap());

        registry.disconnect(DEFAULT_CONNECTION).unwrap();
        assert!(matches!(
            registry.current(),
            Err(FluentError::NoActiveConnection(_))
        ));

        registry.set_current("reports").unwrap();
        assert!(registry.ping().unwrap());

        registry.disconnect_all().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pragmas_are_applied() {
        let mut registry = ConnectionRegistry::new();
        registry.open(&memory_config(DEFAULT_CONNECTION)).unwrap();

        let enabled: i64 = registry
            .current()
            .unwrap()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_rand_function_is_available() {
        let mut registry = ConnectionRegistry::new();
        registry.add("x", Connection::open_in_memory().unwrap()).unwrap();

        let r: f64 = registry
            .get("x")
            .unwrap()
            .query_row("SELECT rand()", [], |row| row.get(0))
            .unwrap();
        assert!((0.0..1.0).contains(&r));
    }

    #[test]
    fn test_open_error_handling() {
        let mut registry = ConnectionRegistry::new();
        let mut config = memory_config("broken");
        config.path = "/nonexistent/path/database.db".to_string();

        match registry.open(&config).unwrap_err() {
            FluentError::Database(_) => {}
            other => panic!("Expected Database error, got {:?}", other),
        }
    }
}

use crate::core::{FluentError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Rows per page used by `paginate` when the configuration does not say otherwise.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Prepended to every base table and join target
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u64,
    /// Record a trace entry for every executed statement
    #[serde(default)]
    pub trace: bool,
    #[serde(default, rename = "connection")]
    pub connections: Vec<ConnectionConfig>,
}

/// One named SQLite database.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default = "default_connection_name")]
    pub name: String,
    /// File path, or `:memory:`
    pub path: String,
    /// Applied as `PRAGMA <entry>` right after opening
    #[serde(default = "default_pragmas")]
    pub pragmas: Vec<String>,
}

fn default_page_limit() -> u64 {
    DEFAULT_PAGE_LIMIT
}

fn default_connection_name() -> String {
    crate::core::db::DEFAULT_CONNECTION.to_string()
}

fn default_pragmas() -> Vec<String> {
    vec!["foreign_keys = ON".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prefix: String::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
            trace: false,
            connections: Vec::new(),
        }
    }
}

impl ConnectionConfig {
    /// An in-memory database with the default pragmas.
    pub fn memory(name: &str) -> Self {
        ConnectionConfig {
            name: name.to_string(),
            path: ":memory:".to_string(),
            pragmas: default_pragmas(),
        }
    }
}

impl FromStr for Config {
    type Err = FluentError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(|e| FluentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Rejects duplicate connection names and a zero page size.
    pub fn validate(&self) -> Result<()> {
        if self.page_limit == 0 {
            return Err(FluentError::Config("page_limit must be at least 1".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for connection in &self.connections {
            if !seen.insert(connection.name.as_str()) {
                return Err(FluentError::Config(format!(
                    "connection '{}' is defined more than once",
                    connection.name
                )));
            }
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = fluentdb::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    content.parse()
}

/// `<config dir>/fluentdb/config.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fluentdb").join("config.toml"))
}

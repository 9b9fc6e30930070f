//! Configuration: `sqlmig.toml` in the working directory, falling back to
//! the user config directory. Command line flags override file values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ledger::DEFAULT_TABLE;

/// Project config file name.
pub const CONFIG_FILE: &str = "sqlmig.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0} is not configured (set it in sqlmig.toml or pass it on the command line)")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    #[default]
    Postgres,
    Rpc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Remote procedure that executes SQL text.
    pub function: String,
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            function: "exec_sql".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub migrations_dir: PathBuf,
    pub ledger_table: String,
    pub executor: ExecutorKind,
    pub database: DatabaseConfig,
    pub rpc: RpcConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: DEFAULT_TABLE.to_string(),
            executor: ExecutorKind::default(),
            database: DatabaseConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

impl Config {
    /// Load from `explicit` if given, else `./sqlmig.toml`, else the global
    /// config file, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(&local);
        }

        match Self::global_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/sqlmig/config.toml`
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlmig").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .ok_or(ConfigError::Missing("database.url"))
    }

    pub fn rpc_url(&self) -> Result<&str, ConfigError> {
        self.rpc.url.as_deref().ok_or(ConfigError::Missing("rpc.url"))
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.database.acquire_timeout_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }
}

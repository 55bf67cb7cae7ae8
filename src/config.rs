use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::db::ConnectionConfig;
use crate::core::{DbError, Result};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

/// Connection settings.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Resolves the file's settings into a connection config.
    ///
    /// Host, user, password and name follow the all-or-nothing rule of
    /// `ConnectionConfig::resolve`; the timeout applies either way.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let db = &self.database;
        let mut config = ConnectionConfig::resolve(
            db.host.as_deref(),
            db.user.as_deref(),
            db.password.as_deref(),
            db.name.as_deref(),
        )
        .map_err(|e| DbError::Config(e.to_string()))?;

        if let Some(secs) = db.timeout_secs {
            config.timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

/// Where the configuration file lives when none is given explicitly.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lazydb").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| DbError::Config(e.to_string()))
}

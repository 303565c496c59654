use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use types::{Catalog, CatalogError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
    /// Commands a table will queue before senders wait.
    pub table_command_buffer: usize,
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            catalog_path: None,
            table_command_buffer: 64,
            idle_timeout_secs: 30 * 60,
        }
    }
}

impl ServerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let config = Self::from_yaml(&std::fs::read_to_string(path)?)?;
        log::info!("Loaded server config from {}", path.display());
        Ok(config)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => Ok(Catalog::load(path)?),
            None => Ok(Catalog::standard()),
        }
    }
}

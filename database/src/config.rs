use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{retry_with_backoff, DatabaseError};

const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

impl DatabaseConfig {
    pub fn from_cli_or_env_or_yaml(cli_arg: Option<String>, yaml_config: Option<String>) -> Self {
        let url = if let Some(arg) = cli_arg {
            arg
        } else if let Ok(env) = std::env::var("DATABASE_URL") {
            env
        } else if let Some(yaml) = yaml_config {
            yaml
        } else {
            MEMORY_URL.to_string()
        };

        Self { url, pool_size: 20 }
    }

    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_URL || self.url.contains(":memory:")
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, DatabaseError> {
        let options = if self.url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(&self.url)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?
        } else {
            SqliteConnectOptions::new().filename(&self.url)
        };
        Ok(options.create_if_missing(true))
    }

    pub async fn create_pool(&self) -> Result<sqlx::SqlitePool, DatabaseError> {
        let connect_options = self.connect_options()?;
        // every connection to an in-memory database sees its own empty database
        let max_connections = if self.is_memory() { 1 } else { self.pool_size };
        let pool_options = SqlitePoolOptions::new().max_connections(max_connections);

        retry_with_backoff(
            || {
                let connect_options = connect_options.clone();
                let pool_options = pool_options.clone();
                Box::pin(async move { pool_options.connect_with(connect_options).await })
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| DatabaseError::RetryExhausted(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let config = DatabaseConfig::from_cli_or_env_or_yaml(
            Some("games.db".to_string()),
            Some("other.db".to_string()),
        );
        assert_eq!(config.url, "games.db");
        assert!(!config.is_memory());
    }

    #[test]
    fn test_memory_url_is_detected() {
        let config = DatabaseConfig {
            url: MEMORY_URL.to_string(),
            pool_size: 20,
        };
        assert!(config.is_memory());
    }
}

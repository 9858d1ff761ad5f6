//! Environment-driven configuration, loaded once at startup.

use std::env;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file, or ":memory:" for an ephemeral instance.
    pub database_path: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl Config {
    /// Read configuration from the environment (a `.env` file is honored).
    /// `DATABASE_PATH` is required; `BIND_ADDR` defaults to localhost.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let database_path = env::var("DATABASE_PATH")
            .map_err(|_| AppError::Parse("DATABASE_PATH must be set".to_string()))?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        Ok(Config {
            database_path,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_path_is_an_error() {
        // Serialize access to the process environment.
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DATABASE_PATH");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn bind_addr_defaults_to_localhost() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DATABASE_PATH", ":memory:");
        std::env::remove_var("BIND_ADDR");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_path, ":memory:");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");

        std::env::remove_var("DATABASE_PATH");
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
}

//! Service configuration.
//!
//! Values come from environment variables with fixed defaults. A `.env`
//! file in the working directory is applied first without overriding
//! variables that are already set.

use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_REST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CONNECTIONS_FILE: &str = ".connections.json";

/// Application configuration shared across handlers.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name used in logs and response metadata.
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Connect timeout for native database drivers.
    pub connect_timeout_secs: u64,
    /// Pool size for relational exploration connections.
    pub max_connections: u32,
    /// Timeout for generic REST exploration requests.
    pub rest_timeout_secs: u64,
    /// Flat JSON file backing the saved-connection registry.
    pub connections_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "explorer-service".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            rest_timeout_secs: DEFAULT_REST_TIMEOUT_SECS,
            connections_file: PathBuf::from(DEFAULT_CONNECTIONS_FILE),
        }
    }
}

impl AppConfig {
    /// Loads configuration for the named service from the environment.
    pub fn load_with_service(service_name: &str) -> Self {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            host: std::env::var("SERVER_HOST").unwrap_or(defaults.host),
            port: env_parse("SERVER_PORT").unwrap_or(defaults.port),
            connect_timeout_secs: env_parse("CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout_secs),
            max_connections: env_parse("MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            rest_timeout_secs: env_parse("REST_TIMEOUT_SECS").unwrap_or(defaults.rest_timeout_secs),
            connections_file: std::env::var("CONNECTIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.connections_file),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_secs(self.rest_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Load .env file from the working directory (best-effort, no error if missing).
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    let Ok(content) = std::fs::read_to_string(env_path) else {
        return;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();
            // Only set if not already set by the environment
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rest_timeout(), Duration::from_secs(5));
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.connections_file, PathBuf::from(".connections.json"));
    }

    #[test]
    fn test_dotenv_does_not_override_existing() {
        let path = std::env::temp_dir().join(format!("explorer-env-{}", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "# comment\nEXPLORER_TEST_NEW=from_file\nEXPLORER_TEST_SET=from_file\n",
        )
        .unwrap();
        std::env::set_var("EXPLORER_TEST_SET", "from_env");

        load_dotenv_from(&path);

        assert_eq!(std::env::var("EXPLORER_TEST_NEW").unwrap(), "from_file");
        assert_eq!(std::env::var("EXPLORER_TEST_SET").unwrap(), "from_env");
        let _ = std::fs::remove_file(path);
    }
}

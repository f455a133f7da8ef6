//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Compiled defaults (the `defaults` module)
//! 2. Optional config file (`--config` path, or `config/default.*` if present)
//! 3. Environment variables, e.g. `HARVESTER_SCRAPING__REQUEST_DELAY_MS=500`

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "HARVESTER";

/// Default config file looked up when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Compiled defaults
pub mod defaults {
    pub const DATABASE_URL: &str = "sqlite:data/listings.db";

    pub const BASE_URL: &str = "https://listado.mercadolibre.com.co/";
    /// Results per upstream listing page; drives the `_Desde_` offset
    pub const RESULTS_PER_PAGE: u32 = 48;
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";

    pub const REQUEST_DELAY_MS: u64 = 1000;
    pub const HTTP_TIMEOUT_SECS: u64 = 10;
    /// Overall wall-clock budget for one on-demand request or one refreshed query
    pub const REQUEST_BUDGET_SECS: u64 = 120;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 1;

    pub const MAX_CONCURRENT_QUERIES: usize = 4;
    pub const COMMIT_RETRY_LIMIT: u32 = 3;
    pub const COMMIT_RETRY_BACKOFF_MS: u64 = 50;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_DIR: &str = "logs";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraping: ScrapingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
        }
    }
}

/// Scraping and pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub base_url: String,
    pub user_agent: String,
    pub results_per_page: u32,
    /// Pause before every page fetch
    pub request_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub request_budget_secs: u64,
    pub max_requests_per_second: u32,
    /// Worker pool size shared by on-demand requests and refresh sweeps
    pub max_concurrent_queries: usize,
    /// Total commit attempts before a watermark conflict is surfaced
    pub commit_retry_limit: u32,
    pub commit_retry_backoff_ms: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            results_per_page: defaults::RESULTS_PER_PAGE,
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            http_timeout_secs: defaults::HTTP_TIMEOUT_SECS,
            request_budget_secs: defaults::REQUEST_BUDGET_SECS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_concurrent_queries: defaults::MAX_CONCURRENT_QUERIES,
            commit_retry_limit: defaults::COMMIT_RETRY_LIMIT,
            commit_retry_backoff_ms: defaults::COMMIT_RETRY_BACKOFF_MS,
        }
    }
}

impl ScrapingConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_budget_secs)
    }

    pub fn commit_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.commit_retry_backoff_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON format for file output
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Directory for the log file, relative to the working directory
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: defaults::LOG_DIR.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads defaults, then the config file, then `HARVESTER_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::build(path, env_source())
    }

    fn build(path: Option<&Path>, environment: config::Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let app_config: Self = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scraping = &self.scraping;
        if scraping.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("scraping.base_url must not be empty".into()));
        }
        if url::Url::parse(&scraping.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "scraping.base_url is not a valid URL: {}",
                scraping.base_url
            )));
        }
        if scraping.max_concurrent_queries == 0 {
            return Err(ConfigError::Invalid("scraping.max_concurrent_queries must be at least 1".into()));
        }
        if scraping.http_timeout_secs == 0 || scraping.request_budget_secs == 0 {
            return Err(ConfigError::Invalid("scraping timeouts must be greater than 0".into()));
        }
        if scraping.commit_retry_limit == 0 {
            return Err(ConfigError::Invalid("scraping.commit_retry_limit must be at least 1".into()));
        }
        if scraping.max_requests_per_second == 0 {
            return Err(ConfigError::Invalid("scraping.max_requests_per_second must be at least 1".into()));
        }
        if scraping.results_per_page == 0 {
            return Err(ConfigError::Invalid("scraping.results_per_page must be at least 1".into()));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid("database.url must not be empty".into()));
        }
        Ok(())
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        env_source().source(Some(map))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scraping.request_delay(), Duration::from_secs(1));
        assert_eq!(config.scraping.results_per_page, 48);
        assert!(config.scraping.user_agent.contains("Chrome/136.0.0.0"));
    }

    #[test]
    fn test_file_then_env_layering() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[scraping]\nrequest_delay_ms = 250\nmax_concurrent_queries = 2\n\n[database]\nurl = \"sqlite::memory:\""
        )
        .unwrap();

        let config = AppConfig::build(
            Some(file.path()),
            env_from(&[("HARVESTER_SCRAPING__MAX_CONCURRENT_QUERIES", "8")]),
        )
        .unwrap();

        assert_eq!(config.scraping.request_delay_ms, 250);
        assert_eq!(config.scraping.max_concurrent_queries, 8);
        assert_eq!(config.database.url, "sqlite::memory:");
        // untouched keys keep their defaults
        assert_eq!(config.scraping.commit_retry_limit, defaults::COMMIT_RETRY_LIMIT);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::build(Some(Path::new("/nonexistent/harvester.toml")), env_from(&[]));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = AppConfig::build(
            None,
            env_from(&[("HARVESTER_SCRAPING__MAX_CONCURRENT_QUERIES", "0")]),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_commit_retries_rejected() {
        let mut config = AppConfig::default();
        config.scraping.commit_retry_limit = 0;
        assert!(config.validate().is_err());
    }
}

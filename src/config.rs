use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::Store;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Per-attempt request timeout, applied to every strategy.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Explicit Chrome binary for the browser-rendered strategy.
    #[serde(default)]
    pub chrome_path: Option<String>,
    /// Opaque per-store cookie values, injected as a request header.
    #[serde(default)]
    pub cookies: CookieConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CookieConfig {
    #[serde(default)]
    pub xkom: Option<String>,
    #[serde(default)]
    pub morele: Option<String>,
    #[serde(default)]
    pub amazon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between poll cycles in continuous mode.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Worker-pool size within one cycle.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_db_path() -> String {
    "data/prices.sqlite3".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    // Reasonable browser UA; aggressive sites get the cookie or browser
    // strategies instead of UA games.
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/126.0.0.0 Safari/537.36"
        .to_string()
}

fn default_interval_secs() -> u64 {
    900
}

fn default_workers() -> usize {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            chrome_path: None,
            cookies: CookieConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            workers: default_workers(),
        }
    }
}

impl CookieConfig {
    pub fn for_store(&self, store: Store) -> Option<&str> {
        match store {
            Store::XKom => self.xkom.as_deref(),
            Store::Morele => self.morele.as_deref(),
            Store::Amazon => self.amazon.as_deref(),
            Store::Unknown => None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "ELPW"
            .add_source(Environment::with_prefix("ELPW").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.fetcher.chrome_path.is_none() {
            config.fetcher.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Message("Database path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.fetcher.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Fetcher timeout_secs must be greater than 0".into(),
            ));
        }

        if self.fetcher.user_agent.trim().is_empty() {
            return Err(ConfigError::Message(
                "Fetcher user_agent must not be empty".into(),
            ));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message(
                "Scheduler interval_secs must be greater than 0".into(),
            ));
        }

        if self.scheduler.workers == 0 || self.scheduler.workers > 16 {
            return Err(ConfigError::Message(
                "Scheduler workers must be between 1 and 16".into(),
            ));
        }

        Ok(())
    }
}

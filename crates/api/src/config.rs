//! Process configuration.
//!
//! Sources, lowest precedence first: built-in defaults, `config/default.toml`,
//! `config/{environment}.toml`, then `KARDEX_*` environment variables with `__`
//! between nested keys (`KARDEX_SERVER__PORT=9000`). A `.env` file is read
//! into the environment before anything else.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use thiserror::Error;

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub environment: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    pub filter: String,
    /// `json` or `pretty`.
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load from files and environment, selecting the profile from
    /// `KARDEX_ENVIRONMENT` (default `development`).
    pub fn load() -> Result<Self, ConfigLoadError> {
        let _ = dotenvy::dotenv();
        let environment =
            std::env::var("KARDEX_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let config = defaults(&environment)?
            .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("KARDEX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEFAULT_ENV)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.store.backend == StoreBackend::Postgres
            && self.store.url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(ConfigLoadError::Invalid(
                "store.url is required when store.backend is postgres".into(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigLoadError::Invalid(
                "store.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigLoadError> {
    Ok(config::Config::builder()
        .set_default("environment", environment)?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("store.backend", "memory")?
        .set_default("store.max_connections", 10)?
        .set_default("log.filter", "info")?
        .set_default("log.format", "json")?
        .set_default("cors.allowed_origins", Vec::<String>::new())?)
}

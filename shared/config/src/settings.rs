//! Application settings and configuration loading

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use validator::Validate;

use riskmesh_common::constants::http::DEFAULT_PORT;

use crate::engine::EngineConfig;

/// Main application settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppSettings {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    pub redis: RedisConfig,

    /// API key authentication configuration
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Risk engine tunables
    #[validate(nested)]
    pub engine: EngineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,

    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string; `None` selects the in-memory log.
    pub url: Option<String>,

    pub max_connections: Option<u32>,
}

/// Redis configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection string; `None` selects the process-local cache.
    pub url: Option<String>,
}

/// One registered API client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiKeyEntry {
    #[validate(length(min = 8))]
    pub key: String,

    #[validate(length(min = 1))]
    pub name: String,

    #[validate(range(min = 1))]
    pub rate_limit_per_minute: u32,
}

/// API key authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    #[validate(length(min = 1), nested)]
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: vec![
                ApiKeyEntry {
                    key: "riskmesh-key-demo-001".to_string(),
                    name: "demo".to_string(),
                    rate_limit_per_minute: 100,
                },
                ApiKeyEntry {
                    key: "riskmesh-key-demo-002".to_string(),
                    name: "test".to_string(),
                    rate_limit_per_minute: 50,
                },
            ],
        }
    }
}

impl AppSettings {
    /// Load configuration from defaults, optional YAML files, and environment.
    pub fn load() -> Result<Self, ConfigError> {
        // Pull a .env file into the process environment first, if present.
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppSettings::default())?);

        if Path::new("config/default.yaml").exists() {
            builder = builder.add_source(File::with_name("config/default").format(FileFormat::Yaml));
        }

        let run_env = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
        let env_config = format!("config/{}.yaml", run_env);
        if Path::new(&env_config).exists() {
            builder =
                builder.add_source(File::with_name(&format!("config/{}", run_env)).format(FileFormat::Yaml));
        }

        // RISKMESH_ENGINE__ALPHA=0.6 style overrides for nested settings.
        builder = builder.add_source(
            Environment::with_prefix("RISKMESH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: AppSettings = builder.build()?.try_deserialize()?;

        // Well-known variables are honored verbatim for deploy compatibility.
        if let Ok(url) = env::var("DATABASE_URL") {
            settings.database.url = Some(url);
        }
        if let Ok(url) = env::var("REDIS_URL") {
            settings.redis.url = Some(url);
        }
        if let Ok(port) = env::var("PORT") {
            settings.server.port = port
                .parse()
                .map_err(|_| ConfigError::Message(format!("invalid PORT value '{port}'")))?;
        }

        settings
            .validate()
            .map_err(|e| ConfigError::Message(format!("Configuration validation failed: {e:?}")))?;

        Ok(settings)
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            auth: AuthConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

//! Configuration management for Folio Server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default upload body limit: 200MB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Default idle window for upload progress sessions: 1 hour
pub const DEFAULT_UPLOAD_PROGRESS_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown metadata backend: {0} (expected 'sqlite' or 'memory')")]
    UnknownBackend(String),

    #[error("Unknown environment: {0} (expected 'development' or 'production')")]
    UnknownEnvironment(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub render: RenderConfig,
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory; documents and images live in sub-directories
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub backend: MetadataBackend,
}

/// Which `MetadataStore` implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Sqlite,
    Memory,
}

impl FromStr for MetadataBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub progress_ttl_secs: u64,
}

impl UploadConfig {
    pub fn progress_ttl(&self) -> Duration {
        Duration::from_secs(self.progress_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Path or name of the pdftoppm executable
    pub pdftoppm: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                root: PathBuf::from("./data"),
            },
            database: DatabaseConfig {
                url: "sqlite:./data/folio.db".to_string(),
                backend: MetadataBackend::Sqlite,
            },
            upload: UploadConfig {
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                progress_ttl_secs: DEFAULT_UPLOAD_PROGRESS_TTL_SECS,
            },
            render: RenderConfig {
                pdftoppm: "pdftoppm".to_string(),
            },
            environment: Environment::Development,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port),
            },
            storage: StorageConfig {
                root: env::var("STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.root),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                backend: match env::var("METADATA_BACKEND") {
                    Ok(value) => value.parse()?,
                    Err(_) => defaults.database.backend,
                },
            },
            upload: UploadConfig {
                max_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.upload.max_bytes),
                progress_ttl_secs: parse_var(
                    "UPLOAD_PROGRESS_TTL_SECS",
                    defaults.upload.progress_ttl_secs,
                ),
            },
            render: RenderConfig {
                pdftoppm: env::var("PDFTOPPM_PATH").unwrap_or(defaults.render.pdftoppm),
            },
            environment: match env::var("APP_ENV") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.environment,
            },
        })
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

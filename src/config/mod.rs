//! Configuration layer: typed settings with layered precedence (file → env).

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bookworm";
const ENV_PREFIX: &str = "BOOKWORM";

const DEFAULT_BACKEND_URL: &str = "https://api.bookworm.example/";
const DEFAULT_BOOKS_URL: &str = "https://books.metadata.example/";
const DEFAULT_STORAGE_URL: &str = "https://blobs.bookworm.example/";
const DEFAULT_AUTH_URL: &str = "https://auth.bookworm.example/";
const DEFAULT_CACHE_CAPACITY: usize = 512;
const DEFAULT_CACHE_FRESH_FOR_SECS: u64 = 60;
const DEFAULT_CACHE_EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Typed application settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub books: BooksSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from `config/default.toml`, then `bookworm.toml`, then
    /// `BOOKWORM_*` environment variables, later sources winning.
    pub fn load() -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
            .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the hosted document database.
    pub base_url: String,
    /// Project API key attached to every backend request.
    pub api_key: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BooksSettings {
    /// Base URL of the public book-metadata API.
    pub base_url: String,
}

impl Default for BooksSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BOOKS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Base URL of the blob store.
    pub base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STORAGE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Base URL of the auth provider.
    pub base_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AUTH_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub fresh_for_secs: u64,
    pub event_buffer: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            fresh_for_secs: DEFAULT_CACHE_FRESH_FOR_SECS,
            event_buffer: DEFAULT_CACHE_EVENT_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.cache.capacity, 512);
        assert_eq!(settings.cache.fresh_for_secs, 60);
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(settings.logging.format, LogFormat::Compact);
        assert!(settings.backend.base_url.starts_with("https://"));
    }

    #[test]
    fn log_level_converts_to_filter() {
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    }
}

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Top-level service settings.
///
/// Layered as: struct defaults, `config/default.toml`, `config/local.toml`,
/// then `MEDSUM__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub storage: StorageSettings,
    pub fetch: FetchSettings,
    pub subscriber: SubscriberSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("MEDSUM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            name: "medsum_analytics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

/// S3-compatible object storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Custom endpoint (MinIO, Ceph, ...). Path-style addressing is always used.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Bucket assumed for legacy payloads that only carry a job id.
    pub default_bucket: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            default_bucket: "medsum-data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl FetchSettings {
    /// Attempts below one are treated as unset.
    pub fn effective_max_attempts(&self) -> u32 {
        if self.max_attempts < 1 { 3 } else { self.max_attempts }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubscriberSettings {
    pub transcription_channel: String,
    pub summary_channel: String,
    pub corrections_channel: String,
    pub backoff_secs: u64,
    /// Stop a channel's loop on an empty payload instead of skipping it.
    pub stop_on_empty_payload: bool,
}

impl SubscriberSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            transcription_channel: "transcribe_complete".to_string(),
            summary_channel: "summary_complete".to_string(),
            corrections_channel: "corrections_complete".to_string(),
            backoff_secs: 5,
            stop_on_empty_payload: false,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fully resolved configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Value stamped into every measurement's `app_id` property.
    pub app_id: String,
    pub state: StateConfig,
    pub delivery: DeliverySettings,
    pub measurement: MeasurementConfig,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Credentials for the metrics API, only needed by commands that talk to it.
#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub email: String,
    pub api_token: String,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Optional settings file contents. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub delivery: DeliverySettings,
    #[serde(default)]
    pub measurement: MeasurementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
    #[serde(default = "default_last_record_file")]
    pub last_record_file: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            lock_file: default_lock_file(),
            last_record_file: default_last_record_file(),
        }
    }
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("etl.lock")
}

fn default_last_record_file() -> PathBuf {
    PathBuf::from("etl.last")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliverySettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            timeout: default_timeout(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasurementConfig {
    /// Source identifier attached to every measurement.
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
        }
    }
}

fn default_source() -> String {
    "littledog.com".to_string()
}

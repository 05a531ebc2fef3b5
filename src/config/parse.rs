use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, unexpanded_env_vars};
use std::path::Path;
use thiserror::Error;

pub const DB_HOST: &str = "DB_HOST";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWORD: &str = "DB_PASSWORD";
pub const DB_DATABASE: &str = "DB_DATABASE";
pub const TSI_APP_ID: &str = "TSI_APP_ID";
pub const TSP_EMAIL: &str = "TSP_EMAIL";
pub const TSP_API_TOKEN: &str = "TSP_API_TOKEN";
pub const TSP_API_HOST: &str = "TSP_API_HOST";

const DEFAULT_API_HOST: &str = "api.truesight.bmc.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("required environment variables are not set: {}", .0.join(", "))]
    MissingVar(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Loads settings and the required environment in one step.
pub fn load_config(settings_path: Option<&Path>) -> Result<Config, ConfigError> {
    let settings = load_settings(settings_path)?;
    Config::from_lookup(settings, |key| std::env::var(key).ok())
}

/// Reads the optional YAML settings file. `None` yields the defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };

    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read settings file '{}': {}", path.display(), e),
        ))
    })?;

    parse_settings(&yaml_string)
}

/// Parses settings from YAML text, expanding `$env{VAR}` references and `~` in paths.
pub fn parse_settings(yaml: &str) -> Result<Settings, ConfigError> {
    let yaml_string = expand_env_vars(yaml);

    let unexpanded = unexpanded_env_vars(&yaml_string);
    if !unexpanded.is_empty() {
        return Err(ConfigError::Validation(format!(
            "environment variables referenced in settings are not set: {}",
            unexpanded.join(", ")
        )));
    }

    // An empty document deserializes as unit, not as an empty mapping.
    let mut settings: Settings = if yaml_string.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(&yaml_string)?
    };

    settings.state.lock_file = expand_tilde(&settings.state.lock_file);
    settings.state.last_record_file = expand_tilde(&settings.state.last_record_file);

    validate_settings(&settings)?;
    Ok(settings)
}

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.delivery.batch_size == 0 {
        return Err(ConfigError::Validation(
            "delivery.batch_size must be greater than zero".to_string(),
        ));
    }
    if settings.state.lock_file == settings.state.last_record_file {
        return Err(ConfigError::Validation(
            "state.lock_file and state.last_record_file must be different paths".to_string(),
        ));
    }
    if settings.measurement.source.trim().is_empty() {
        return Err(ConfigError::Validation(
            "measurement.source must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Collects required variables, reporting every missing name at once.
struct Required<F> {
    lookup: F,
    missing: Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> Required<F> {
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn get(&mut self, key: &str) -> String {
        match (self.lookup)(key).filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => {
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingVar(self.missing))
        }
    }
}

impl Config {
    /// Builds the config from settings plus the required variables supplied by `lookup`.
    pub fn from_lookup<F>(settings: Settings, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut required = Required::new(lookup);
        let database = DatabaseConfig {
            host: required.get(DB_HOST),
            user: required.get(DB_USER),
            password: required.get(DB_PASSWORD),
            database: required.get(DB_DATABASE),
        };
        let app_id = required.get(TSI_APP_ID);
        required.finish()?;

        Ok(Self {
            database,
            app_id,
            state: settings.state,
            delivery: settings.delivery,
            measurement: settings.measurement,
        })
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(TSP_API_HOST)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        let mut required = Required::new(lookup);
        let email = required.get(TSP_EMAIL);
        let api_token = required.get(TSP_API_TOKEN);
        required.finish()?;

        Ok(Self {
            host,
            email,
            api_token,
        })
    }
}

pub mod config;
pub mod metrics;
pub mod preview;
pub mod run;
pub mod watermark;

use crate::config::{validate_settings, Config, ConfigError, Settings};
use std::path::{Path, PathBuf};

/// State paths given on the command line, taking precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct StateOverrides {
    pub lock_file: Option<PathBuf>,
    pub last_record_file: Option<PathBuf>,
}

impl StateOverrides {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.lock_file {
            settings.state.lock_file = path.clone();
        }
        if let Some(path) = &self.last_record_file {
            settings.state.last_record_file = path.clone();
        }
    }
}

/// Settings file (if any) plus command-line overrides, validated.
pub fn load_settings(
    config_path: Option<&Path>,
    overrides: &StateOverrides,
) -> Result<Settings, ConfigError> {
    let mut settings = crate::config::load_settings(config_path)?;
    overrides.apply(&mut settings);
    validate_settings(&settings)?;
    Ok(settings)
}

/// Full configuration from the environment, settings file and overrides.
pub fn load_config(
    config_path: Option<&Path>,
    overrides: &StateOverrides,
) -> Result<Config, ConfigError> {
    let settings = load_settings(config_path, overrides)?;
    Config::from_lookup(settings, |key| std::env::var(key).ok())
}

use super::StateOverrides;
use crate::config::generate::generate_starter_settings;
use crate::config::{Config, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let content = generate_starter_settings();

    if stdout {
        print!("{}", content);
        return Ok(());
    }

    let home_dir = dirs::home_dir().ok_or("Cannot determine home directory; use --stdout")?;
    let config_path = home_dir.join(".config/tsp-mysql/config.yml");

    if config_path.exists() {
        return Err(format!(
            "Settings file already exists at {}. Remove it first or use --stdout to print it",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, content)?;

    println!("Settings file written to {}", config_path.display());
    Ok(())
}

/// Checks the settings file and required environment without touching the database.
pub fn validate(
    config_path: Option<PathBuf>,
    overrides: &StateOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    match &config_path {
        Some(path) => println!("Validating settings file: {}", path.display()),
        None => println!("No settings file found, checking defaults"),
    }

    let config = resolve(config_path.as_deref(), overrides, |key| std::env::var(key).ok())?;
    print_summary(&config.state.lock_file, &config.state.last_record_file);
    println!("✓ Configuration is valid");
    Ok(())
}

fn resolve<F>(
    config_path: Option<&Path>,
    overrides: &StateOverrides,
    lookup: F,
) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = super::load_settings(config_path, overrides)?;
    Config::from_lookup(settings, lookup)
}

fn print_summary(lock_file: &Path, last_record_file: &Path) {
    println!("  lock file:        {}", lock_file.display());
    println!("  last record file: {}", last_record_file.display());
}

use super::StateOverrides;
use crate::storage::WatermarkStore;
use std::path::Path;

pub fn show(
    config_path: Option<&Path>,
    overrides: &StateOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = super::load_settings(config_path, overrides)?;
    let store = WatermarkStore::new(&settings.state.last_record_file);

    match store.load()? {
        Some(watermark) => println!("{watermark}"),
        None => println!("unset"),
    }

    Ok(())
}

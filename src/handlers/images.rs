//! Handler for the `check-images` command.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use crate::config::Config;
use crate::error::{InjectorError, Result};
use crate::injector::ImageStatus;
use crate::registry::{ManifestStore, ProbeSettings, RegistryClient, check_images_exist, extract_images};

/// Handle the `check-images` command. Any missing image is an error.
pub async fn handle_check_images(manifest: &Path, json: bool, config: &Config) -> Result<()> {
    let content = fs::read_to_string(manifest)?;
    let images = extract_images(&content);
    let store: Arc<dyn ManifestStore> = Arc::new(RegistryClient::new(&config.registry)?);
    let results = check_images_exist(store, &images, &ProbeSettings::from(&config.registry)).await;

    let statuses: Vec<ImageStatus> = images
        .into_iter()
        .map(|image| ImageStatus {
            exists: results.get(&image).copied().unwrap_or(false),
            image,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else if statuses.is_empty() {
        println!("No images found in {}", manifest.display());
    } else {
        for status in &statuses {
            let mark = if status.exists { "✓".green() } else { "✗".red() };
            println!("  {} {}", mark, status.image);
        }
    }

    let missing: Vec<String> = statuses
        .into_iter()
        .filter(|s| !s.exists)
        .map(|s| s.image)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InjectorError::MissingImages(missing))
    }
}

pub mod types;

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub use types::{Config, InjectionConfig, OutputConfig, RegistryConfig};

const CONFIG_FILE_NAME: &str = ".chart-injector.toml";

/// Get the global config file path (~/.chart-injector.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (chart/.chart-injector.toml)
pub fn local_config_path(chart_path: &Path) -> PathBuf {
    chart_path.join(CONFIG_FILE_NAME)
}

/// Load configuration from an explicit file. The file must exist and parse.
pub fn load_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }
    let content = fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| ConfigError::ParsingFailed(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Load configuration from file or use defaults
/// Checks local config first, then global config
pub fn load_config(chart_path: Option<&Path>) -> Result<Config> {
    let candidates = chart_path
        .map(local_config_path)
        .into_iter()
        .chain(global_config_path());

    for path in candidates {
        if !path.exists() {
            continue;
        }
        match load_config_file(&path) {
            Ok(config) => {
                log::debug!("Loaded configuration from {}", path.display());
                return Ok(config);
            }
            Err(e) => log::warn!("Ignoring configuration {}: {}", path.display(), e),
        }
    }

    Ok(Config::default())
}

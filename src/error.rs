//! Error types for chart injection.
//!
//! Fatal conditions (missing catalog, missing values file, rendering failures,
//! missing images) surface as [`InjectorError`]. Per-fragment and per-key
//! problems are logged and skipped by the engines and never reach this type.

use std::path::PathBuf;

use thiserror::Error;

use crate::registry::RegistryError;

/// Top-level error for every injector operation.
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The injection block catalog could not be read or is not a mapping
    #[error("Invalid block catalog {path}: {message}")]
    Catalog { path: PathBuf, message: String },

    /// The chart directory is missing a required file
    #[error("Chart error: {0}")]
    Chart(String),

    /// `values.yaml.backup` does not exist
    #[error("No backup found at {0}")]
    BackupNotFound(PathBuf),

    /// Rendering the chart failed
    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// One or more images referenced by the rendered chart do not exist
    #[error("{} image(s) not found in registry: {}", .0.len(), .0.join(", "))]
    MissingImages(Vec<String>),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    ParsingFailed(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, InjectorError>;

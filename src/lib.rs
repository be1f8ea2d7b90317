//! # chart-injector
//!
//! Applies a standard set of operational policy fragments (tolerations,
//! affinity rules, priority classes, environment injection) to third-party
//! Helm charts without disturbing their formatting, comments or ordering, and
//! without duplicating content on repeated runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chart_injector::config::Config;
//! use chart_injector::injector::{BlockCatalog, ProcessOptions, inject_chart};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = BlockCatalog::load(Path::new("inject-blocks.yaml"))?;
//! let report = inject_chart(
//!     Path::new("./charts/app"),
//!     &catalog,
//!     &Config::default(),
//!     ProcessOptions::default(),
//! )?;
//! println!("changed: {}", report.changed());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod injector;
pub mod registry;
pub mod render;

// Re-export commonly used types and functions
pub use error::{InjectorError, Result};
pub use handlers::*;
pub use injector::{BlockCatalog, MergeMode, ProcessOptions, ProcessReport, inject_chart, process_chart};

use cli::Commands;
use config::Config;
use std::path::Path;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Explicit `--config` file, else the chart's local file, else the global one.
pub fn resolve_config(explicit: Option<&Path>, chart_dir: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => config::load_config_file(path),
        None => config::load_config(chart_dir),
    }
}

pub async fn run_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Inject {
            path,
            blocks,
            critical_ds,
            control_plane,
            dry_run,
            skip_image_check,
            registry_username,
            registry_password,
            json,
        } => {
            let config = resolve_config(config_path, Some(&path))?;
            let options = handlers::InjectOptions {
                blocks,
                critical_ds,
                control_plane,
                dry_run,
                skip_image_check,
                registry_username,
                registry_password,
                json,
            };
            handlers::handle_inject(&path, options, config).await
        }
        Commands::Scan { path, json } => {
            let config = resolve_config(config_path, Some(&path))?;
            handlers::handle_scan(&path, json, &config)
        }
        Commands::CheckImages { manifest, json } => {
            let config = resolve_config(config_path, None)?;
            handlers::handle_check_images(&manifest, json, &config).await
        }
        Commands::Restore { path } => {
            let config = resolve_config(config_path, Some(&path))?;
            handlers::handle_restore(&path, &config)
        }
    }
}

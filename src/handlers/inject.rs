//! Handler for the `inject` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use crate::config::Config;
use crate::error::Result;
use crate::injector::{BlockCatalog, PodProfile, ProcessOptions, ProcessReport, process_chart};
use crate::registry::{ManifestStore, RegistryClient};
use crate::render::HelmCliRenderer;

/// Configuration for the inject command
#[derive(Debug, Clone)]
pub struct InjectOptions {
    /// Injection block catalog
    pub blocks: PathBuf,
    pub critical_ds: bool,
    pub control_plane: bool,
    pub dry_run: bool,
    pub skip_image_check: bool,
    pub registry_username: Option<String>,
    pub registry_password: Option<String>,
    pub json: bool,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            blocks: PathBuf::from("inject-blocks.yaml"),
            critical_ds: false,
            control_plane: false,
            dry_run: false,
            skip_image_check: false,
            registry_username: None,
            registry_password: None,
            json: false,
        }
    }
}

/// Handle the `inject` command.
pub async fn handle_inject(path: &Path, options: InjectOptions, mut config: Config) -> Result<()> {
    let catalog = BlockCatalog::load(&options.blocks)?;
    if catalog.is_empty() {
        log::warn!("Block catalog {} has no usable blocks", options.blocks.display());
    }
    for (category, count) in catalog.summary() {
        log::debug!("Catalog {}: {} block(s)", category, count);
    }

    if options.registry_username.is_some() {
        config.registry.username = options.registry_username.clone();
    }
    if options.registry_password.is_some() {
        config.registry.password = options.registry_password.clone();
    }

    let process_options = ProcessOptions {
        profile: PodProfile {
            critical_ds: options.critical_ds,
            control_plane: options.control_plane,
        },
        dry_run: options.dry_run,
        check_images: !options.skip_image_check,
    };
    let store: Arc<dyn ManifestStore> = Arc::new(RegistryClient::new(&config.registry)?);
    let renderer = HelmCliRenderer::default();

    let report = process_chart(path, &catalog, &config, process_options, &renderer, store).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ProcessReport) {
    let heading = if report.dry_run {
        "Dry run (no files written)".yellow().bold()
    } else if report.changed() {
        "Chart updated".green().bold()
    } else {
        "Chart already up to date".green().bold()
    };
    println!("{} {}", heading, report.chart.display().to_string().dimmed());

    if report.values_changed {
        let keys: Vec<String> = report
            .satisfied
            .iter()
            .chain(report.new_values.iter())
            .cloned()
            .collect();
        println!("  {} values: {}", "•".cyan(), keys.join(", "));
    }
    if report.backup_created {
        println!("  {} backup written", "•".cyan());
    }
    for path in &report.unresolved {
        println!("  {} {} not found in values", "!".yellow(), path);
    }

    for template in report.templates.iter().filter(|t| t.changed) {
        let mut parts = Vec::new();
        if !template.pod_keys.is_empty() {
            parts.push(format!("pod [{}]", template.pod_keys.join(", ")));
        }
        if !template.container_keys.is_empty() {
            parts.push(format!("containers [{}]", template.container_keys.join(", ")));
        }
        println!(
            "  {} {} ({}): {}",
            "•".cyan(),
            template.path.display(),
            template.kind,
            parts.join(", ")
        );
    }

    if !report.images.is_empty() {
        let missing = report.missing_images();
        if missing.is_empty() {
            println!("  {} {} image(s) found", "✓".green(), report.images.len());
        } else {
            for image in missing {
                println!("  {} image not found: {}", "✗".red(), image);
            }
        }
    }
}

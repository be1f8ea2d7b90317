//! Chart-level driver.
//!
//! Scans every template for `.Values` references, patches referenced keys
//! into the values file, injects the remaining pod and container keys straight
//! into each workload template, merges new root values, and finally checks
//! that every image of the rendered chart exists.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use walkdir::WalkDir;

use super::backup::{create_backup, write_atomic};
use super::catalog::{BlockCatalog, BlockCategory, InjectionBlock, PodProfile};
use super::inline::inject_template;
use super::parser::{TargetReference, detect_kind, scan_value_references};
use super::root_values::inject_root_values;
use super::values::{ValuesPatch, patch_values};
use crate::config::Config;
use crate::error::{InjectorError, Result};
use crate::registry::{ManifestStore, ProbeSettings, check_images_exist, extract_images};
use crate::render::ChartRenderer;

const TEMPLATE_EXTENSIONS: &[&str] = &["yaml", "yml", "tpl"];

/// Knobs for one chart run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    pub profile: PodProfile,
    /// Compute everything, write nothing, never fail on missing images
    pub dry_run: bool,
    pub check_images: bool,
}

/// Per-template result.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateReport {
    pub path: PathBuf,
    pub kind: String,
    pub changed: bool,
    pub pod_keys: Vec<String>,
    pub container_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageStatus {
    pub image: String,
    pub exists: bool,
}

/// Everything a chart run did (or would do in dry-run mode).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub chart: PathBuf,
    pub dry_run: bool,
    pub backup_created: bool,
    pub values_changed: bool,
    /// Value paths patched into the values file
    pub satisfied: Vec<String>,
    /// Referenced paths that have candidates but could not be placed
    pub unresolved: Vec<String>,
    /// Root keys merged from new values
    pub new_values: Vec<String>,
    pub templates: Vec<TemplateReport>,
    pub images: Vec<ImageStatus>,
}

impl ProcessReport {
    pub fn changed(&self) -> bool {
        self.values_changed || self.templates.iter().any(|t| t.changed)
    }

    pub fn missing_images(&self) -> Vec<String> {
        self.images
            .iter()
            .filter(|i| !i.exists)
            .map(|i| i.image.clone())
            .collect()
    }
}

/// Static view of one template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateScan {
    /// Path relative to the chart directory
    pub path: PathBuf,
    /// Workload kind, when eligible for in-place injection
    pub kind: Option<String>,
    pub references: Vec<String>,
}

/// Static view of a whole chart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartScan {
    pub templates: Vec<TemplateScan>,
    /// Distinct referenced value paths across all templates
    pub references: Vec<String>,
}

struct TemplateFile {
    path: PathBuf,
    relative: PathBuf,
    content: String,
    kind: Option<String>,
    references: Vec<TargetReference>,
}

fn load_templates(chart_dir: &Path, config: &Config) -> Result<Vec<TemplateFile>> {
    let dir = chart_dir.join(&config.injection.templates_dir);
    if !dir.is_dir() {
        log::warn!("No templates directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut templates = Vec::new();
    for entry in WalkDir::new(&dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let eligible = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e));
        if !eligible {
            continue;
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Skipping unreadable template {}: {}", path.display(), e);
                continue;
            }
        };
        let relative = path.strip_prefix(chart_dir).unwrap_or(path).to_path_buf();
        templates.push(TemplateFile {
            path: path.to_path_buf(),
            relative,
            kind: detect_kind(&content, |k| config.injection.is_workload_kind(k)),
            references: scan_value_references(&content),
            content,
        });
    }
    Ok(templates)
}

/// List value references and workload kinds without changing anything.
pub fn scan_chart(chart_dir: &Path, config: &Config) -> Result<ChartScan> {
    let templates = load_templates(chart_dir, config)?;
    let mut scan = ChartScan::default();
    for template in templates {
        for reference in &template.references {
            let dotted = reference.dotted();
            if !scan.references.contains(&dotted) {
                scan.references.push(dotted);
            }
        }
        scan.templates.push(TemplateScan {
            path: template.relative,
            kind: template.kind,
            references: template.references.iter().map(|r| r.dotted()).collect(),
        });
    }
    Ok(scan)
}

/// Patch the values file and the workload templates of a chart.
pub fn inject_chart(
    chart_dir: &Path,
    catalog: &BlockCatalog,
    config: &Config,
    options: ProcessOptions,
) -> Result<ProcessReport> {
    let values_path = chart_dir.join(&config.injection.values_file);
    if !values_path.is_file() {
        return Err(InjectorError::Chart(format!(
            "{} not found",
            values_path.display()
        )));
    }
    let templates = load_templates(chart_dir, config)?;
    let original = fs::read_to_string(&values_path)?;
    let mut report = ProcessReport {
        chart: chart_dir.to_path_buf(),
        dry_run: options.dry_run,
        ..Default::default()
    };

    // Referenced keys go to the values file
    let mut seen = HashSet::new();
    let mut patches = Vec::new();
    for reference in templates.iter().flat_map(|t| t.references.iter()) {
        if !seen.insert(reference.dotted()) {
            continue;
        }
        let blocks = catalog.candidates_for_key(&reference.key, options.profile);
        if !blocks.is_empty() {
            patches.push(ValuesPatch {
                target: reference.clone(),
                blocks,
            });
        }
    }
    let values = patch_values(
        &original,
        &patches,
        config.injection.values_mode,
        &config.injection,
    );
    report.satisfied = values.satisfied;
    report.unresolved = values.unresolved;

    let new_values = catalog.blocks_in(&[BlockCategory::NewValues]);
    let root = inject_root_values(&values.content, &new_values, &config.injection);
    report.new_values = root.merged.into_iter().chain(root.added).collect();
    let patched_values = root.content;
    report.values_changed = patched_values != original;

    // Everything else goes straight into the templates
    let pod_blocks = catalog.pod_blocks(options.profile);
    let container_blocks = catalog.container_blocks();
    let mut template_writes = Vec::new();
    for template in &templates {
        let Some(kind) = &template.kind else {
            continue;
        };
        let referenced: HashSet<&str> = template.references.iter().map(|r| r.key.as_str()).collect();
        let pod = without_keys(&pod_blocks, &referenced);
        let containers = without_keys(&container_blocks, &referenced);

        let Some(outcome) = inject_template(
            &template.content,
            &pod,
            &containers,
            config.injection.template_mode,
            &config.injection,
        ) else {
            continue;
        };
        if outcome.changed {
            log::info!(
                "Injected into {}: {}",
                template.relative.display(),
                outcome
                    .pod_keys
                    .iter()
                    .chain(outcome.container_keys.iter())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            template_writes.push((template.path.clone(), outcome.content.clone()));
        }
        report.templates.push(TemplateReport {
            path: template.relative.clone(),
            kind: kind.clone(),
            changed: outcome.changed,
            pod_keys: outcome.pod_keys,
            container_keys: outcome.container_keys,
        });
    }

    if options.dry_run {
        log::info!("Dry run, leaving {} untouched", chart_dir.display());
        return Ok(report);
    }
    if report.changed() && config.output.create_backup {
        report.backup_created = create_backup(&values_path)?;
    }
    if report.values_changed {
        write_atomic(&values_path, &patched_values)?;
    }
    for (path, content) in template_writes {
        write_atomic(&path, &content)?;
    }
    Ok(report)
}

fn without_keys<'a>(blocks: &[&'a InjectionBlock], keys: &HashSet<&str>) -> Vec<&'a InjectionBlock> {
    blocks
        .iter()
        .copied()
        .filter(|b| !keys.contains(b.key.as_str()))
        .collect()
}

/// Patch the chart, then check that every rendered image exists.
///
/// Missing images fail the run unless `options.dry_run` is set; files are
/// already written by then.
pub async fn process_chart(
    chart_dir: &Path,
    catalog: &BlockCatalog,
    config: &Config,
    options: ProcessOptions,
    renderer: &dyn ChartRenderer,
    store: Arc<dyn ManifestStore>,
) -> Result<ProcessReport> {
    let mut report = inject_chart(chart_dir, catalog, config, options)?;
    if !options.check_images {
        return Ok(report);
    }

    let manifest = renderer.render(chart_dir)?;
    let images = extract_images(&manifest);
    log::info!("Checking {} image(s)", images.len());
    let results = check_images_exist(store, &images, &ProbeSettings::from(&config.registry)).await;
    report.images = images
        .into_iter()
        .map(|image| ImageStatus {
            exists: results.get(&image).copied().unwrap_or(false),
            image,
        })
        .collect();

    let missing = report.missing_images();
    if !missing.is_empty() {
        if options.dry_run {
            log::warn!("Missing images (dry run): {}", missing.join(", "));
        } else {
            return Err(InjectorError::MissingImages(missing));
        }
    }
    Ok(report)
}

//! Chart rendering.
//!
//! Rendering is delegated to the `helm` binary; the injector only consumes the
//! rendered manifest text to extract image references.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{InjectorError, Result};

/// Turns a chart directory into a rendered multi-document manifest.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart_dir: &Path) -> Result<String>;
}

/// Renders charts with `helm template`.
#[derive(Debug, Clone)]
pub struct HelmCliRenderer {
    pub binary: PathBuf,
    pub release_name: String,
    pub namespace: Option<String>,
}

impl Default for HelmCliRenderer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("helm"),
            release_name: "test".to_string(),
            namespace: None,
        }
    }
}

impl HelmCliRenderer {
    /// Check if the helm binary is available.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .arg("--short")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl ChartRenderer for HelmCliRenderer {
    fn render(&self, chart_dir: &Path) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("template").arg(&self.release_name).arg(chart_dir);
        if let Some(namespace) = &self.namespace {
            cmd.arg("--namespace").arg(namespace);
        }

        log::debug!("Rendering chart {}", chart_dir.display());
        let output = cmd.output().map_err(|e| {
            InjectorError::Render(format!("failed to run {}: {}", self.binary.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectorError::Render(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Serves an already rendered manifest from disk, ignoring the chart.
#[derive(Debug, Clone)]
pub struct ManifestFileRenderer {
    pub path: PathBuf,
}

impl ChartRenderer for ManifestFileRenderer {
    fn render(&self, _chart_dir: &Path) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| {
            InjectorError::Render(format!("cannot read {}: {}", self.path.display(), e))
        })
    }
}

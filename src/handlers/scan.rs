//! Handler for the `scan` command.

use std::path::Path;

use colored::Colorize;

use crate::config::Config;
use crate::error::Result;
use crate::injector::scan_chart;

/// Handle the `scan` command.
pub fn handle_scan(path: &Path, json: bool, config: &Config) -> Result<()> {
    let scan = scan_chart(path, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scan)?);
        return Ok(());
    }

    println!(
        "{} {} template(s), {} value reference(s)",
        "Scanned".bold(),
        scan.templates.len(),
        scan.references.len()
    );
    for template in &scan.templates {
        let kind = template.kind.as_deref().unwrap_or("-");
        println!("  {} [{}]", template.path.display(), kind.cyan());
        for reference in &template.references {
            println!("    .Values.{}", reference);
        }
    }
    Ok(())
}

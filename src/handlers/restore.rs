//! Handler for the `restore` command.

use std::path::Path;

use colored::Colorize;

use crate::config::Config;
use crate::error::Result;
use crate::injector::restore_backup;

/// Handle the `restore` command.
pub fn handle_restore(path: &Path, config: &Config) -> Result<()> {
    let values = path.join(&config.injection.values_file);
    let backup = restore_backup(&values)?;
    println!(
        "{} {} from {}",
        "Restored".green().bold(),
        values.display(),
        backup.display()
    );
    Ok(())
}

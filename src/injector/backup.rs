//! Values file backup, restore and atomic writes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{InjectorError, Result};

pub const BACKUP_SUFFIX: &str = ".backup";

/// `values.yaml` -> `values.yaml.backup`
pub fn backup_path(values: &Path) -> PathBuf {
    let mut name = values.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copy `values` to its backup unless a backup already exists.
///
/// Returns whether a new backup was written.
pub fn create_backup(values: &Path) -> Result<bool> {
    let backup = backup_path(values);
    if backup.exists() {
        log::debug!("Keeping existing backup {}", backup.display());
        return Ok(false);
    }
    fs::copy(values, &backup)?;
    log::info!("Backed up {} to {}", values.display(), backup.display());
    Ok(true)
}

/// Copy the backup back over `values`.
pub fn restore_backup(values: &Path) -> Result<PathBuf> {
    let backup = backup_path(values);
    if !backup.exists() {
        return Err(InjectorError::BackupNotFound(backup));
    }
    let content = fs::read(&backup)?;
    write_atomic(values, &content)?;
    log::info!("Restored {} from {}", values.display(), backup.display());
    Ok(backup)
}

/// Write through a temp file in the same directory, then rename over `path`.
pub fn write_atomic(path: &Path, content: impl AsRef<[u8]>) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_ref())?;
    tmp.flush()?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_is_never_overwritten() {
        let temp = TempDir::new().unwrap();
        let values = temp.path().join("values.yaml");
        fs::write(&values, "original: true\n").unwrap();

        assert!(create_backup(&values).unwrap());
        fs::write(&values, "patched: true\n").unwrap();
        assert!(!create_backup(&values).unwrap());

        let backup = fs::read_to_string(backup_path(&values)).unwrap();
        assert_eq!(backup, "original: true\n");
    }

    #[test]
    fn test_restore_round_trip() {
        let temp = TempDir::new().unwrap();
        let values = temp.path().join("values.yaml");
        fs::write(&values, "original: true\n").unwrap();
        create_backup(&values).unwrap();
        fs::write(&values, "patched: true\n").unwrap();

        let backup = restore_backup(&values).unwrap();
        assert_eq!(backup, temp.path().join("values.yaml.backup"));
        assert_eq!(fs::read_to_string(&values).unwrap(), "original: true\n");
    }

    #[test]
    fn test_restore_without_backup_fails() {
        let temp = TempDir::new().unwrap();
        let values = temp.path().join("values.yaml");
        fs::write(&values, "a: 1\n").unwrap();
        assert!(matches!(
            restore_backup(&values),
            Err(InjectorError::BackupNotFound(_))
        ));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("values.yaml");
        fs::write(&path, "old\n").unwrap();
        write_atomic(&path, "new\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        // No temp files left behind
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}

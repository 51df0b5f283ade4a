//! Reading and writing schema documents on disk.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<String, StoreError> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| StoreError::io(path, e))
}

/// Write `text` to `path`. An existing file is first copied to
/// `<path>.<yyyyMMddHHmmss>.bak`; the backup path is returned.
pub fn save_with_backup(path: impl AsRef<Path>, text: &str) -> Result<Option<PathBuf>, StoreError> {
    let path = path.as_ref();
    let backup = if path.exists() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|e| StoreError::io(&backup, e))?;
        tracing::debug!(backup = %backup.display(), "previous version saved");
        Some(backup)
    } else {
        None
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::write(path, text).map_err(|e| StoreError::io(path, e))?;
    Ok(backup)
}

fn backup_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}.bak", stamp));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shop.erd");

        assert_eq!(save_with_backup(&path, "erDiagram\n").unwrap(), None);
        assert_eq!(load(&path).unwrap(), "erDiagram\n");

        let backup = save_with_backup(&path, "erDiagram\n  A {\n  }\n").unwrap().unwrap();
        assert_eq!(load(&backup).unwrap(), "erDiagram\n");
        assert!(backup.to_string_lossy().ends_with(".bak"));
        assert!(load(&path).unwrap().contains("A {"));
    }

    #[test]
    fn test_load_missing_names_path() {
        let err = load("does/not/exist.erd").unwrap_err();
        assert!(err.to_string().starts_with("does/not/exist.erd"));
    }
}

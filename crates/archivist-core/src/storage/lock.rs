use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::sqlite::Database;
use crate::error::Error;

/// Cross-process exclusive lock on a catalog, held by ingestion and migration.
///
/// Released when dropped. In-memory catalogs have no file and are never locked.
#[derive(Debug)]
pub struct CatalogLock {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl CatalogLock {
    pub fn acquire(db: &Database) -> Result<Self, Error> {
        match db.path() {
            Some(catalog) => Self::acquire_path(catalog),
            None => Ok(CatalogLock {
                file: None,
                path: None,
            }),
        }
    }

    pub fn acquire_path(catalog: &Path) -> Result<Self, Error> {
        let lock_path = lock_path_for(catalog);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(Error::CatalogLocked(lock_path));
        }
        debug!("Acquired catalog lock {}", lock_path.display());
        Ok(CatalogLock {
            file: Some(file),
            path: Some(lock_path),
        })
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
            if let Some(path) = &self.path {
                debug!("Released catalog lock {}", path.display());
            }
        }
    }
}

/// `<catalog>.lock` next to the catalog file.
pub fn lock_path_for(catalog: &Path) -> PathBuf {
    let mut name = catalog.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.db");
        let first = CatalogLock::acquire_path(&catalog).unwrap();
        let second = CatalogLock::acquire_path(&catalog);
        assert!(matches!(second, Err(Error::CatalogLocked(_))));
        drop(first);
        assert!(CatalogLock::acquire_path(&catalog).is_ok());
    }

    #[test]
    fn test_in_memory_catalog_needs_no_lock() {
        let db = Database::open_in_memory().unwrap();
        let lock = CatalogLock::acquire(&db).unwrap();
        assert!(lock.path.is_none());
    }

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path_for(Path::new("/data/archivist.db")),
            PathBuf::from("/data/archivist.db.lock")
        );
    }
}

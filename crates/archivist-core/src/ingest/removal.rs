use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::ensure_migrated;
use crate::error::Error;
use crate::layout;
use crate::metadata::MediaCategory;
use crate::migration::backup;
use crate::storage::models::BackupSnapshot;
use crate::storage::{CatalogLock, Database};

pub const TRASH_DIR: &str = ".trash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    /// Delete the backing file.
    Remove,
    /// Keep the backing file under `.trash/`.
    Tombstone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub tombstone_id: i64,
    pub snapshot: Option<BackupSnapshot>,
    /// Where the file went, when it was kept.
    pub trash_path: Option<PathBuf>,
    pub file_was_missing: bool,
}

/// Remove an asset row, recording a tombstone.
///
/// Runs under the catalog lock on a fully migrated catalog. The file is moved to
/// `.trash/` first and moved back if the catalog update fails. `Remove` takes a catalog
/// snapshot before anything changes and deletes the trashed file only after the commit.
pub fn remove_asset(
    db: &Database,
    archive_root: &Path,
    backups_dir: &Path,
    category: MediaCategory,
    content_hash: &str,
    mode: RemovalMode,
) -> Result<RemovalOutcome, Error> {
    let _lock = CatalogLock::acquire(db)?;
    ensure_migrated(db)?;

    let asset = db
        .get_asset(category, content_hash)?
        .ok_or_else(|| Error::NotFound {
            entity: "asset",
            id: content_hash.to_string(),
        })?;

    let snapshot = match mode {
        RemovalMode::Remove => Some(backup::snapshot(db, backups_dir, "pre-remove", None)?),
        RemovalMode::Tombstone => None,
    };

    let source = layout::to_absolute(archive_root, &asset.archive_path);
    let trash_relative = format!("{TRASH_DIR}/{}", asset.archive_path);
    let trash = unused_path(layout::to_absolute(archive_root, &trash_relative));

    let file_was_missing = !source.exists();
    if file_was_missing {
        warn!("Backing file {} is already missing", source.display());
    } else {
        move_file(&source, &trash)?;
    }

    let kept_path = match mode {
        RemovalMode::Tombstone if !file_was_missing => trash
            .strip_prefix(archive_root)
            .map(layout::to_catalog_path)
            .ok(),
        _ => None,
    };

    let committed = (|| -> rusqlite::Result<i64> {
        let tx = db.connection().unchecked_transaction()?;
        let id = db.insert_tombstone(&asset, kept_path.as_deref())?;
        db.delete_asset(category, content_hash)?;
        tx.commit()?;
        Ok(id)
    })();

    let tombstone_id = match committed {
        Ok(id) => id,
        Err(e) => {
            if !file_was_missing {
                if let Err(undo) = move_file(&trash, &source) {
                    warn!("Could not restore {}: {}", source.display(), undo);
                }
            }
            return Err(e.into());
        }
    };

    let trash_path = match mode {
        RemovalMode::Remove => {
            if !file_was_missing {
                fs::remove_file(&trash)?;
            }
            None
        }
        RemovalMode::Tombstone => (!file_was_missing).then_some(trash),
    };

    info!(
        "Removed {} {} ({:?})",
        category, content_hash, mode
    );
    Ok(RemovalOutcome {
        tombstone_id,
        snapshot,
        trash_path,
        file_was_missing,
    })
}

fn unused_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut counter = 1;
    loop {
        let candidate = path.with_file_name(format!("{stem}-{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Rename, or copy and delete when the rename cannot cross filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), Error> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(e.into()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unused_path_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        let taken = dir.path().join("a.jpg");
        fs::write(&taken, b"x").unwrap();
        fs::write(dir.path().join("a-1.jpg"), b"x").unwrap();
        assert_eq!(unused_path(taken), dir.path().join("a-2.jpg"));
        assert_eq!(
            unused_path(dir.path().join("free.jpg")),
            dir.path().join("free.jpg")
        );
    }

    #[test]
    fn test_move_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.jpg");
        let to = dir.path().join(".trash/x/y/a.jpg");
        fs::write(&from, b"x").unwrap();
        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"x");
    }
}

//! Verified catalog snapshots taken before anything destructive happens.

use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{ensure_bookkeeping, SchemaVersion};
use crate::error::Error;
use crate::storage::models::BackupSnapshot;
use crate::storage::{CatalogLock, Database};

/// Copy the catalog into `backups_dir` and verify the copy before recording it.
pub fn snapshot(
    db: &Database,
    backups_dir: &Path,
    reason: &str,
    for_version: Option<SchemaVersion>,
) -> Result<BackupSnapshot, Error> {
    let source = db.path().ok_or_else(|| Error::BackupVerificationFailed {
        path: PathBuf::from(":memory:"),
        reason: "in-memory catalogs cannot be snapshotted".to_string(),
    })?;

    ensure_bookkeeping(db.connection())?;
    db.checkpoint()?;
    fs::create_dir_all(backups_dir).map_err(|e| Error::BackupVerificationFailed {
        path: backups_dir.to_path_buf(),
        reason: format!("cannot create backups directory: {e}"),
    })?;

    let now = Utc::now();
    let target = snapshot_path(backups_dir, source, &now.format("%Y%m%d-%H%M%S%3f").to_string(), for_version);
    let source_size = fs::metadata(source)?.len();
    fs::copy(source, &target).map_err(|e| Error::BackupVerificationFailed {
        path: target.clone(),
        reason: format!("copy failed: {e}"),
    })?;

    let snapshot_size = verify_snapshot(&target, source_size)?;
    let created_at = now.to_rfc3339();
    let path = target.to_string_lossy().into_owned();
    let version_label = for_version.map(|v| v.to_string());
    let id = db.insert_snapshot(
        &path,
        &created_at,
        source_size,
        snapshot_size,
        reason,
        version_label.as_deref(),
    )?;

    info!(
        "Snapshot {} written ({} bytes, reason: {})",
        target.display(),
        snapshot_size,
        reason
    );
    Ok(BackupSnapshot {
        id,
        path,
        created_at,
        source_size,
        snapshot_size,
        verified: true,
        reason: reason.to_string(),
        for_version,
    })
}

/// `{stem}-{stamp}[-v{version}].db`, with a counter appended if the name is taken.
fn snapshot_path(
    backups_dir: &Path,
    source: &Path,
    stamp: &str,
    for_version: Option<SchemaVersion>,
) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("catalog");
    let base = match for_version {
        Some(v) => format!("{stem}-{stamp}-v{v}"),
        None => format!("{stem}-{stamp}"),
    };

    let mut candidate = backups_dir.join(format!("{base}.db"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = backups_dir.join(format!("{base}-{counter}.db"));
        counter += 1;
    }
    candidate
}

/// Returns the snapshot size once the copy exists, is no smaller than the source
/// and passes `PRAGMA quick_check`.
pub fn verify_snapshot(path: &Path, min_size: u64) -> Result<u64, Error> {
    let fail = |reason: String| Error::BackupVerificationFailed {
        path: path.to_path_buf(),
        reason,
    };

    let size = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return Err(fail("not a regular file".to_string())),
        Err(e) => return Err(fail(format!("snapshot missing: {e}"))),
    };
    if size < min_size {
        return Err(fail(format!(
            "snapshot is {size} bytes, source was {min_size} bytes"
        )));
    }

    // SQLite may still create WAL sidecars for a read-only open; drop any it leaves behind.
    let leftovers: Vec<PathBuf> = sidecar_paths(path)
        .into_iter()
        .filter(|p| !p.exists())
        .collect();
    let verdict = quick_check(path);
    for sidecar in &leftovers {
        remove_if_present(sidecar)?;
    }

    let verdict = verdict.map_err(|e| fail(e.to_string()))?;
    if verdict != "ok" {
        return Err(fail(format!("quick_check reported: {verdict}")));
    }
    debug!("Snapshot {} verified ({} bytes)", path.display(), size);
    Ok(size)
}

fn quick_check(path: &Path) -> rusqlite::Result<String> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    conn.query_row("PRAGMA quick_check", [], |row| row.get(0))
}

fn sidecar_paths(path: &Path) -> [PathBuf; 2] {
    ["-wal", "-shm"].map(|suffix| {
        let mut sidecar = path.as_os_str().to_os_string();
        sidecar.push(suffix);
        PathBuf::from(sidecar)
    })
}

fn remove_if_present(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Copy a snapshot back over a catalog file that no connection has open.
pub fn restore(snapshot_path: &Path, catalog_path: &Path) -> Result<(), Error> {
    verify_snapshot(snapshot_path, 0)?;
    let _lock = CatalogLock::acquire_path(catalog_path)?;

    // Stale WAL frames would be replayed on top of the restored file.
    for sidecar in sidecar_paths(catalog_path) {
        remove_if_present(&sidecar)?;
    }

    fs::copy(snapshot_path, catalog_path)?;
    info!(
        "Restored {} from {}",
        catalog_path.display(),
        snapshot_path.display()
    );
    Ok(())
}

/// Delete the oldest snapshots (files and rows) beyond the newest `keep`.
pub fn prune_snapshots(db: &Database, keep: usize) -> Result<Vec<BackupSnapshot>, Error> {
    ensure_bookkeeping(db.connection())?;
    let snapshots = db.list_snapshots()?;
    if snapshots.len() <= keep {
        return Ok(Vec::new());
    }

    let excess = snapshots.len() - keep;
    let mut removed = Vec::with_capacity(excess);
    for snapshot in snapshots.into_iter().take(excess) {
        match fs::remove_file(&snapshot.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Snapshot file {} already gone", snapshot.path);
            }
            Err(e) => return Err(e.into()),
        }
        db.delete_snapshot_row(snapshot.id)?;
        debug!("Pruned snapshot {}", snapshot.path);
        removed.push(snapshot);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(dir: &Path) -> Database {
        let db = Database::open(dir.join("archivist.db")).unwrap();
        db.connection()
            .execute_batch("CREATE TABLE notes (body TEXT); INSERT INTO notes VALUES ('kept');")
            .unwrap();
        db
    }

    #[test]
    fn test_snapshot_is_verified_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let db = catalog(dir.path());
        let backups = dir.path().join("backups");

        let snap = snapshot(&db, &backups, "manual", Some(SchemaVersion::new(0, 1, 3))).unwrap();
        assert!(snap.verified);
        assert!(snap.snapshot_size >= snap.source_size);
        assert!(snap.path.ends_with("-v0.1.3.db"));
        assert_eq!(db.list_snapshots().unwrap(), vec![snap]);
    }

    #[test]
    fn test_verification_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let db = catalog(dir.path());
        let snap = snapshot(&db, &dir.path().join("backups"), "manual", None).unwrap();
        let snap_path = Path::new(&snap.path);
        let before = fs::read(snap_path).unwrap();

        verify_snapshot(snap_path, 0).unwrap();
        assert_eq!(fs::read(snap_path).unwrap(), before);
        for sidecar in sidecar_paths(snap_path) {
            assert!(!sidecar.exists(), "{} left behind", sidecar.display());
        }
    }

    #[test]
    fn test_backups_dir_that_is_a_file_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let db = catalog(dir.path());
        let not_a_dir = dir.path().join("backups");
        fs::write(&not_a_dir, b"occupied").unwrap();

        let err = snapshot(&db, &not_a_dir, "manual", None).unwrap_err();
        assert!(matches!(err, Error::BackupVerificationFailed { ref path, .. } if path == &not_a_dir));
        assert!(db.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn test_same_instant_snapshots_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("archivist.db");
        fs::write(dir.path().join("archivist-20240101-000000000.db"), b"x").unwrap();
        let path = snapshot_path(dir.path(), &source, "20240101-000000000", None);
        assert_eq!(path, dir.path().join("archivist-20240101-000000000-1.db"));
    }

    #[test]
    fn test_in_memory_catalog_cannot_be_snapshotted() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let result = snapshot(&db, dir.path(), "manual", None);
        assert!(matches!(result, Err(Error::BackupVerificationFailed { .. })));
    }

    #[test]
    fn test_truncated_copy_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("copy.db");
        fs::write(&bogus, b"SQLite format 3\0 but not really").unwrap();
        assert!(matches!(
            verify_snapshot(&bogus, 4096),
            Err(Error::BackupVerificationFailed { .. })
        ));
        assert!(verify_snapshot(&bogus, 0).is_err());
        assert!(verify_snapshot(&dir.path().join("missing.db"), 0).is_err());
    }

    #[test]
    fn test_restore_brings_back_old_contents() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("archivist.db");
        let backups = dir.path().join("backups");
        let snap_path = {
            let db = catalog(dir.path());
            let snap = snapshot(&db, &backups, "manual", None).unwrap();
            db.connection().execute("DELETE FROM notes", []).unwrap();
            snap.path
        };

        restore(Path::new(&snap_path), &catalog_path).unwrap();
        let db = Database::open(&catalog_path).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let db = catalog(dir.path());
        let backups = dir.path().join("backups");
        let first = snapshot(&db, &backups, "manual", None).unwrap();
        let second = snapshot(&db, &backups, "manual", None).unwrap();
        let third = snapshot(&db, &backups, "manual", None).unwrap();

        let removed = prune_snapshots(&db, 2).unwrap();
        assert_eq!(removed, vec![first.clone()]);
        assert!(!Path::new(&first.path).exists());
        let left: Vec<i64> = db.list_snapshots().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(left, vec![second.id, third.id]);
        assert!(prune_snapshots(&db, 2).unwrap().is_empty());
    }
}

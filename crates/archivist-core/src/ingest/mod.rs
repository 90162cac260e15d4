//! Archive ingestion: staged files become catalog rows backed by files in the layout.

pub mod removal;
pub mod transition;

use rusqlite::ffi;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::hasher::ContentIdentity;
use crate::layout;
use crate::metadata::{AssetMetadata, MediaCategory};
use crate::progress::ProgressReporter;
use crate::storage::models::{ArchiveAsset, Location, StagingRecord, StagingStatus, SubLocation};
use crate::storage::Database;
use transition::{place_file, Placement};

pub use removal::{remove_asset, RemovalMode, RemovalOutcome};
pub use transition::TransitionMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum FileStatus {
    Imported,
    /// Content was already archived when the ingestor reached it; nothing written.
    Skipped,
    Duplicate(String),
    Failed(String),
}

/// What happened to one submitted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Position in the submitted list.
    pub index: usize,
    pub source_path: PathBuf,
    pub content_hash: Option<String>,
    pub archive_path: Option<String>,
    pub status: FileStatus,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub imported: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchResult {
    pub fn new(batch_id: impl Into<String>) -> Self {
        BatchResult {
            batch_id: batch_id.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Imported => self.imported += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Duplicate(_) => self.duplicates += 1,
            FileStatus::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn merge(&mut self, other: BatchResult) {
        for outcome in other.outcomes {
            self.record(outcome);
        }
        self.outcomes.sort_by_key(|o| o.index);
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// A staging record paired with what the extractor found.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub index: usize,
    pub record: StagingRecord,
    pub metadata: AssetMetadata,
}

pub struct Ingestor<'a> {
    db: &'a Database,
    archive_root: PathBuf,
    link_files: bool,
}

impl<'a> Ingestor<'a> {
    pub fn new(db: &'a Database, archive_root: impl AsRef<Path>) -> Self {
        Ingestor {
            db,
            archive_root: archive_root.as_ref().to_path_buf(),
            link_files: true,
        }
    }

    /// With `false`, files are always copied into the archive instead of hard linked.
    pub fn link_files(mut self, enabled: bool) -> Self {
        self.link_files = enabled;
        self
    }

    /// Ingest `files` in order. Pending records are placed and inserted; duplicate
    /// records pass through as duplicates. Per-file failures never stop the batch.
    ///
    /// When a pending file fails, the next in-batch duplicate of the same content is
    /// ingested in its place.
    pub fn ingest_batch(
        &self,
        location: &Location,
        sub_location: Option<&SubLocation>,
        files: &[StagedFile],
        reporter: &dyn ProgressReporter,
    ) -> BatchResult {
        let batch_id = files
            .first()
            .map(|f| f.record.batch_id.clone())
            .unwrap_or_default();
        let mut result = BatchResult::new(batch_id);
        let mut pending = files
            .iter()
            .filter(|f| f.record.status == StagingStatus::Pending)
            .count();

        let start = Instant::now();
        reporter.on_ingest_start(pending);
        let mut done = 0;
        // Content whose staged copy failed and is still missing from the archive.
        let mut unarchived: HashSet<(MediaCategory, String)> = HashSet::new();

        for file in files {
            let key = (file.record.category, file.record.content_hash.clone());
            let outcome = match file.record.status {
                StagingStatus::Pending => {
                    let outcome = self.ingest_one(location, sub_location, file);
                    done += 1;
                    reporter.on_ingest_progress(done, pending);
                    outcome
                }
                StagingStatus::Duplicate if unarchived.contains(&key) => {
                    debug!(
                        "Ingesting {} in place of a failed file with the same content",
                        file.record.source_path
                    );
                    pending += 1;
                    let outcome = self.ingest_one(location, sub_location, file);
                    done += 1;
                    reporter.on_ingest_progress(done, pending);
                    outcome
                }
                StagingStatus::Duplicate => FileOutcome {
                    index: file.index,
                    source_path: PathBuf::from(&file.record.source_path),
                    content_hash: Some(file.record.content_hash.clone()),
                    archive_path: None,
                    status: FileStatus::Duplicate(file.record.reason.clone().unwrap_or_default()),
                    warnings: file.record.warnings.clone(),
                },
                other => {
                    debug!("Not ingesting {} in state {}", file.record.source_path, other);
                    continue;
                }
            };
            if matches!(outcome.status, FileStatus::Failed(_)) {
                unarchived.insert(key);
            } else {
                unarchived.remove(&key);
            }
            result.record(outcome);
        }

        reporter.on_ingest_complete(result.imported, start.elapsed().as_secs_f64());
        info!(
            "Ingest finished: {} imported, {} skipped, {} duplicate, {} failed",
            result.imported, result.skipped, result.duplicates, result.failed
        );
        result
    }

    fn ingest_one(
        &self,
        location: &Location,
        sub_location: Option<&SubLocation>,
        file: &StagedFile,
    ) -> FileOutcome {
        let record = &file.record;
        let mut outcome = FileOutcome {
            index: file.index,
            source_path: PathBuf::from(&record.source_path),
            content_hash: Some(record.content_hash.clone()),
            archive_path: None,
            status: FileStatus::Imported,
            warnings: record.warnings.clone(),
        };

        let status = match self.transition(location, sub_location, file) {
            Ok(Transitioned::Inserted(archive_path)) => {
                outcome.archive_path = Some(archive_path);
                FileStatus::Imported
            }
            Ok(Transitioned::AlreadyArchived) => FileStatus::Skipped,
            Ok(Transitioned::LostRace) => FileStatus::Duplicate(
                "another writer archived this content first".to_string(),
            ),
            Err(e) => {
                error!("Failed to ingest {}: {}", record.source_path, e);
                FileStatus::Failed(e.to_string())
            }
        };

        let (staging_status, reason) = match &status {
            FileStatus::Imported => (StagingStatus::Archived, None),
            FileStatus::Skipped => (StagingStatus::Duplicate, Some("content already archived")),
            FileStatus::Duplicate(reason) => (StagingStatus::Duplicate, Some(reason.as_str())),
            FileStatus::Failed(reason) => (StagingStatus::Error, Some(reason.as_str())),
        };
        // Imported rows were already marked inside the insert transaction.
        if staging_status != StagingStatus::Archived {
            if let Err(e) = self.db.update_staging_status(record.id, staging_status, reason) {
                warn!("Could not update staging record {}: {}", record.id, e);
            }
        }

        outcome.status = status;
        outcome
    }

    fn transition(
        &self,
        location: &Location,
        sub_location: Option<&SubLocation>,
        file: &StagedFile,
    ) -> Result<Transitioned, Error> {
        let record = &file.record;
        if self.db.asset_exists(record.category, &record.content_hash)? {
            debug!("{} already archived, skipping", record.content_hash);
            return Ok(Transitioned::AlreadyArchived);
        }

        let identity = ContentIdentity::from_stored(&record.content_hash)
            .ok_or_else(|| Error::Other(format!("malformed content hash '{}'", record.content_hash)))?;
        let source = Path::new(&record.source_path);
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let relative = layout::resolve_asset_path(
            location,
            sub_location,
            record.category,
            file.metadata.hardware_class(),
            identity.short_hash(),
            &extension,
        );
        let archive_path = layout::to_catalog_path(&relative);
        let destination = self.archive_root.join(&relative);

        let placement = place_file(
            source,
            &destination,
            &identity,
            record.size_bytes,
            self.link_files,
        )?;
        debug!(
            "Placed {} at {} via {:?}",
            record.source_path,
            destination.display(),
            placement.method
        );
        if let Err(e) = self
            .db
            .update_staging_status(record.id, StagingStatus::Staged, None)
        {
            revert_placement(&placement);
            return Err(e.into());
        }

        let asset = ArchiveAsset {
            content_hash: record.content_hash.clone(),
            location_id: location.id.clone(),
            sub_location_id: sub_location.map(|s| s.id.clone()),
            batch_id: Some(record.batch_id.clone()),
            archive_path: archive_path.clone(),
            original_filename: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension,
            size_bytes: record.size_bytes,
            metadata: file.metadata.clone(),
            imported_at: chrono::Utc::now().to_rfc3339(),
        };

        match self.commit_asset(&asset, record.id) {
            Ok(()) => Ok(Transitioned::Inserted(archive_path)),
            Err(e) => {
                revert_placement(&placement);
                if is_unique_violation(&e) {
                    Ok(Transitioned::LostRace)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Asset row and staging status commit together.
    fn commit_asset(&self, asset: &ArchiveAsset, record_id: i64) -> rusqlite::Result<()> {
        let tx = self.db.connection().unchecked_transaction()?;
        self.db.insert_asset(asset)?;
        self.db
            .update_staging_status(record_id, StagingStatus::Archived, None)?;
        tx.commit()
    }
}

enum Transitioned {
    Inserted(String),
    AlreadyArchived,
    LostRace,
}

fn revert_placement(placement: &Placement) {
    if let Err(e) = placement.revert() {
        error!(
            "Could not remove {} after a failed insert: {}",
            placement.destination.display(),
            e
        );
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

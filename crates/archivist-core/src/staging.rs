//! Staging and deduplication.
//!
//! Every submitted file gets a staging row. A file whose content is already archived
//! in its category, or already staged earlier in the same batch, is marked duplicate
//! here and never reaches the ingestor.

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::Error;
use crate::hasher::{hash_file, ContentIdentity};
use crate::metadata::MediaCategory;
use crate::storage::models::{StagingRecord, StagingStatus};
use crate::storage::Database;

pub const REASON_ALREADY_ARCHIVED: &str = "content already archived";
pub const REASON_SIBLING: &str = "same content as an earlier file in this batch";

pub struct StagingStore<'a> {
    db: &'a Database,
    batch_id: String,
}

impl<'a> StagingStore<'a> {
    /// The batch row must already exist.
    pub fn new(db: &'a Database, batch_id: impl Into<String>) -> Self {
        StagingStore {
            db,
            batch_id: batch_id.into(),
        }
    }

    /// Hash `path` and stage it.
    pub fn submit(&self, path: &Path, category: MediaCategory) -> Result<StagingRecord, Error> {
        let identity = hash_file(path)?;
        let size = fs::metadata(path)?.len();
        self.submit_hashed(path, category, &identity, size, &[])
    }

    /// Stage a file whose hash was computed elsewhere.
    pub fn submit_hashed(
        &self,
        path: &Path,
        category: MediaCategory,
        identity: &ContentIdentity,
        size_bytes: u64,
        warnings: &[String],
    ) -> Result<StagingRecord, Error> {
        let hash = identity.full_hash();
        let (status, reason) = if self.db.asset_exists(category, hash)? {
            (StagingStatus::Duplicate, Some(REASON_ALREADY_ARCHIVED))
        } else if self.db.staged_in_batch(&self.batch_id, category, hash)? {
            (StagingStatus::Duplicate, Some(REASON_SIBLING))
        } else {
            (StagingStatus::Pending, None)
        };

        let record = self.db.insert_staging_record(
            &self.batch_id,
            hash,
            &path.to_string_lossy(),
            category,
            size_bytes,
            status,
            reason,
            warnings,
        )?;
        debug!(
            "Staged {} as {} ({})",
            path.display(),
            record.status,
            identity.short_hash()
        );
        Ok(record)
    }

    pub fn records(&self) -> Result<Vec<StagingRecord>, Error> {
        Ok(self.db.staging_records_for_batch(&self.batch_id)?)
    }
}

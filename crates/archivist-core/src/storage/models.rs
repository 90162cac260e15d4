use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::metadata::{AssetMetadata, MediaCategory};
use crate::migration::SchemaVersion;

/// A physical place being documented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub short_id: String,
    pub name: String,
    pub region: Option<String>,
    pub created_at: String,
}

/// A named part of a location (a building, a room).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLocation {
    pub id: String,
    pub short_id: String,
    pub location_id: String,
    pub name: String,
    pub created_at: String,
}

/// A web page archived for a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveUrl {
    pub id: String,
    pub short_id: String,
    pub location_id: String,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingStatus {
    Pending,
    /// Placed in the archive tree, catalog row not yet committed.
    Staged,
    Duplicate,
    Error,
    /// Kept for history once the asset row exists.
    Archived,
}

impl StagingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StagingStatus::Pending => "pending",
            StagingStatus::Staged => "staged",
            StagingStatus::Duplicate => "duplicate",
            StagingStatus::Error => "error",
            StagingStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StagingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StagingStatus::Pending),
            "staged" => Ok(StagingStatus::Staged),
            "duplicate" => Ok(StagingStatus::Duplicate),
            "error" => Ok(StagingStatus::Error),
            "archived" => Ok(StagingStatus::Archived),
            other => Err(format!("unknown staging status '{other}'")),
        }
    }
}

/// A file waiting to enter the archive, keyed by its content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRecord {
    pub id: i64,
    pub batch_id: String,
    pub content_hash: String,
    pub source_path: String,
    pub category: MediaCategory,
    pub size_bytes: u64,
    pub discovered_at: String,
    pub status: StagingStatus,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
}

/// An archived file, one row per distinct content hash in its category table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveAsset {
    pub content_hash: String,
    pub location_id: String,
    pub sub_location_id: Option<String>,
    pub batch_id: Option<String>,
    /// Relative to the archive root, forward slashes.
    pub archive_path: String,
    pub original_filename: String,
    pub extension: String,
    pub size_bytes: u64,
    pub metadata: AssetMetadata,
    pub imported_at: String,
}

impl ArchiveAsset {
    pub fn category(&self) -> MediaCategory {
        self.metadata.category()
    }
}

/// The identifying columns of an asset, used by the verifier and link queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub category: MediaCategory,
    pub content_hash: String,
    pub archive_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(BatchStatus::Running),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            other => Err(format!("unknown batch status '{other}'")),
        }
    }
}

/// One invocation of the import pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: String,
    pub location_id: String,
    pub sub_location_id: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: BatchStatus,
    pub total_files: i64,
    pub imported: i64,
    pub duplicates: i64,
    pub skipped: i64,
    pub failed: i64,
}

/// A row of the append-only migration ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub version: String,
    pub description: String,
    pub applied_at: String,
    pub checksum: String,
}

/// A verified copy of the catalog taken before a destructive operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub id: i64,
    pub path: String,
    pub created_at: String,
    pub source_size: u64,
    pub snapshot_size: u64,
    pub verified: bool,
    pub reason: String,
    pub for_version: Option<SchemaVersion>,
}

/// Record of an asset removed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTombstone {
    pub id: i64,
    pub category: MediaCategory,
    pub content_hash: String,
    pub archive_path: String,
    pub location_id: String,
    /// Where the file now lives under the archive root, when it was kept.
    pub trash_path: Option<String>,
    pub removed_at: String,
}

//! Versioned catalog schema and the machinery that moves a catalog along it.

pub mod backup;
pub mod orchestrator;
pub mod steps;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub use orchestrator::{MigrationOrchestrator, MigrationState, MigrationStatus, StepInfo, UpgradeOutcome};
pub use steps::{latest_version, migration_chain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::UnknownSchemaVersion(s.to_string()));
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| Error::UnknownSchemaVersion(s.to_string()))?;
        }
        Ok(SchemaVersion::new(numbers[0], numbers[1], numbers[2]))
    }
}

pub type Transform = fn(&Connection) -> rusqlite::Result<()>;

/// One shipped schema change. Never edited after release; the ledger stores its checksum.
#[derive(Clone)]
pub struct MigrationStep {
    pub version: SchemaVersion,
    pub description: &'static str,
    /// Run first. Must be safe to re-run.
    pub sql: &'static str,
    /// Run after `sql`, for changes SQL alone cannot make idempotent.
    pub transform: Option<Transform>,
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl MigrationStep {
    pub fn checksum(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.version.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.description.as_bytes());
        hasher.update(b"|");
        hasher.update(self.sql.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    pub fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        if !self.sql.trim().is_empty() {
            conn.execute_batch(self.sql)?;
        }
        if let Some(transform) = self.transform {
            transform(conn)?;
        }
        Ok(())
    }
}

/// Ledger and snapshot tables. They live outside the versioned chain so that
/// the orchestrator can read state from a brand-new catalog.
pub(crate) fn ensure_bookkeeping(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
             version     TEXT PRIMARY KEY,
             description TEXT NOT NULL,
             applied_at  TEXT NOT NULL,
             checksum    TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS backup_snapshots (
             id            INTEGER PRIMARY KEY AUTOINCREMENT,
             path          TEXT NOT NULL,
             created_at    TEXT NOT NULL,
             source_size   INTEGER NOT NULL,
             snapshot_size INTEGER NOT NULL,
             verified      INTEGER NOT NULL DEFAULT 0,
             reason        TEXT NOT NULL,
             for_version   TEXT
         );",
    )
}

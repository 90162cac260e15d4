use std::path::PathBuf;
use thiserror::Error;

use crate::migration::SchemaVersion;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Could not allocate a unique short id in '{table}' after {attempts} attempts")]
    IdentifierExhausted { table: &'static str, attempts: u32 },

    #[error("Unsupported file type '{extension}' for {}", .path.display())]
    UnsupportedType { path: PathBuf, extension: String },

    #[error("Filesystem transition failed for {content_hash} ({}): {reason}", .destination.display())]
    FilesystemTransitionFailed {
        content_hash: String,
        destination: PathBuf,
        reason: String,
    },

    #[error("Migration stopped at step {version}: {reason}; catalog remains at version {}", display_version(.catalog_version))]
    MigrationStepFailed {
        version: SchemaVersion,
        reason: String,
        catalog_version: Option<SchemaVersion>,
    },

    #[error("Backup verification failed for {}: {reason}", .path.display())]
    BackupVerificationFailed { path: PathBuf, reason: String },

    #[error("Catalog is at version {} but {latest} is required; run the migration first", display_version(.current))]
    CatalogNotMigrated {
        current: Option<SchemaVersion>,
        latest: SchemaVersion,
    },

    #[error("Catalog ledger is inconsistent: {0}")]
    LedgerInconsistent(String),

    #[error("Unknown schema version '{0}'")]
    UnknownSchemaVersion(String),

    #[error("Catalog is locked by another writer ({})", .0.display())]
    CatalogLocked(PathBuf),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Other(String),
}

fn display_version(version: &Option<SchemaVersion>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "none (empty catalog)".to_string(),
    }
}

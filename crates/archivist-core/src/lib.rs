pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod ingest;
pub mod layout;
pub mod metadata;
pub mod migration;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod staging;
pub mod storage;
pub mod verify;

pub use config::AppConfig;
pub use engine::{ensure_migrated, open_catalog, ImportPipeline, ImportSummary};
pub use error::Error;
pub use ingest::{BatchResult, FileOutcome, FileStatus};
pub use metadata::MediaCategory;
pub use migration::{MigrationOrchestrator, SchemaVersion, UpgradeOutcome};
pub use progress::{ProgressReporter, SilentReporter};
pub use storage::Database;
pub use verify::{verify, VerificationReport, VerifyScope};

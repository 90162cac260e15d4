use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher::{hash_content, ContentIdentity};
use crate::ingest::{BatchResult, FileOutcome, FileStatus, Ingestor, StagedFile};
use crate::metadata::{Extraction, MediaCategory, MetadataExtractor};
use crate::migration::{backup, MigrationOrchestrator, UpgradeOutcome};
use crate::progress::ProgressReporter;
use crate::staging::StagingStore;
use crate::storage::models::{BatchStatus, StagingStatus};
use crate::storage::{CatalogLock, Database};
use crate::verify::{self, VerificationReport, VerifyScope};

/// Open the configured catalog, migrating it first when `auto_migrate` is on.
pub fn open_catalog(config: &AppConfig, reporter: &dyn ProgressReporter) -> Result<Database, Error> {
    if let Some(parent) = config.catalog_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let db = Database::open(&config.catalog_path)?;
    if config.auto_migrate {
        let mut orchestrator = MigrationOrchestrator::new(&db, &config.backups_dir);
        if let UpgradeOutcome::Upgraded { applied, .. } = orchestrator.upgrade(None, true, reporter)? {
            info!("Catalog migrated through {} step(s)", applied.len());
            if config.snapshot_keep > 0 {
                backup::prune_snapshots(&db, config.snapshot_keep)?;
            }
        }
    }
    Ok(db)
}

/// Refuse to work on a catalog that is behind the chain or disagrees with it.
pub fn ensure_migrated(db: &Database) -> Result<(), Error> {
    let mut orchestrator = MigrationOrchestrator::new(db, "");
    let status = orchestrator.status()?;
    if !status.is_consistent() {
        return Err(Error::LedgerInconsistent(status.issues.join("; ")));
    }
    if !status.pending.is_empty() {
        return Err(Error::CatalogNotMigrated {
            current: status.current,
            latest: status.latest,
        });
    }
    Ok(())
}

/// Result of the parallel annotate phase for one supported file.
struct Annotated {
    index: usize,
    path: PathBuf,
    category: MediaCategory,
    identity: io::Result<(ContentIdentity, u64)>,
    extraction: Extraction,
}

#[derive(Debug)]
pub struct ImportSummary {
    pub result: BatchResult,
    /// Re-hash of everything this batch archived.
    pub verification: VerificationReport,
}

pub struct ImportPipeline<'a> {
    db: &'a Database,
    config: &'a AppConfig,
    extractor: MetadataExtractor,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(db: &'a Database, config: &'a AppConfig) -> Self {
        Self {
            db,
            config,
            extractor: MetadataExtractor::from_config(config),
        }
    }

    /// Run a batch through the pipeline:
    /// 1. Take the catalog lock and check the catalog is fully migrated
    /// 2. Classify by extension; unsupported files fail individually
    /// 3. Hash and extract metadata in parallel
    /// 4. Stage, deduplicate and ingest in submission order
    /// 5. Verify what was archived
    pub fn submit_import(
        &self,
        location: &str,
        sub_location: Option<&str>,
        paths: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<ImportSummary, Error> {
        let _lock = CatalogLock::acquire(self.db)?;
        ensure_migrated(self.db)?;
        let (location, sub_location) = catalog::resolve_target(self.db, location, sub_location)?;

        let batch_id = Uuid::new_v4().to_string();
        self.db.create_import_batch(
            &batch_id,
            &location.id,
            sub_location.as_ref().map(|s| s.id.as_str()),
            paths.len(),
        )?;
        info!(
            "Import batch {} started: {} file(s) into {}",
            batch_id,
            paths.len(),
            location.name
        );

        let mut result = BatchResult::new(&batch_id);
        let mut supported = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            match self.config.extensions.classify_path(path) {
                Some(category) => supported.push((index, path.clone(), category)),
                None => {
                    let err = Error::UnsupportedType {
                        path: path.clone(),
                        extension: extension_of(path),
                    };
                    warn!("{}", err);
                    result.record(failed(index, path, err.to_string()));
                }
            }
        }

        let annotated = self.annotate(supported, reporter);

        let staging = StagingStore::new(self.db, &batch_id);
        let mut staged = Vec::with_capacity(annotated.len());
        for item in annotated {
            let (identity, size) = match item.identity {
                Ok(read) => read,
                Err(e) => {
                    result.record(failed(item.index, &item.path, format!("cannot read file: {e}")));
                    continue;
                }
            };
            let warnings: Vec<String> = item.extraction.warnings.iter().map(|w| w.to_string()).collect();
            match staging.submit_hashed(&item.path, item.category, &identity, size, &warnings) {
                Ok(record) => {
                    if record.status == StagingStatus::Duplicate {
                        debug!("{} is a duplicate", item.path.display());
                    }
                    staged.push(StagedFile {
                        index: item.index,
                        record,
                        metadata: item.extraction.metadata,
                    });
                }
                Err(e) => {
                    error!("Could not stage {}: {}", item.path.display(), e);
                    result.record(failed(item.index, &item.path, e.to_string()));
                }
            }
        }

        let ingestor =
            Ingestor::new(self.db, &self.config.archive_root).link_files(self.config.link_files);
        result.merge(ingestor.ingest_batch(&location, sub_location.as_ref(), &staged, reporter));

        let verification = verify::verify(
            self.db,
            &self.config.archive_root,
            &VerifyScope::Batch(batch_id.clone()),
            reporter,
        )?;
        let status = if verification.is_clean() {
            BatchStatus::Completed
        } else {
            error!("Batch {} failed post-ingest verification", batch_id);
            BatchStatus::Failed
        };
        self.db.complete_import_batch(
            &batch_id,
            status,
            result.imported,
            result.duplicates,
            result.skipped,
            result.failed,
        )?;

        Ok(ImportSummary {
            result,
            verification,
        })
    }

    fn annotate(
        &self,
        files: Vec<(usize, PathBuf, MediaCategory)>,
        reporter: &dyn ProgressReporter,
    ) -> Vec<Annotated> {
        let total = files.len();
        let start = Instant::now();
        reporter.on_hash_start(total);
        let done = AtomicUsize::new(0);
        let extractor = &self.extractor;

        let annotated: Vec<Annotated> = files
            .into_par_iter()
            .map(|(index, path, category)| {
                let identity = read_identity(&path);
                let extraction = extractor.extract(&path, category);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_hash_progress(n, total);
                Annotated {
                    index,
                    path,
                    category,
                    identity,
                    extraction,
                }
            })
            .collect();

        reporter.on_hash_complete(total, start.elapsed().as_secs_f64());
        annotated
    }
}

/// Hash and size taken from the same open file.
fn read_identity(path: &Path) -> io::Result<(ContentIdentity, u64)> {
    let file = fs::File::open(path)?;
    let size = file.metadata()?.len();
    Ok((hash_content(file)?, size))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn failed(index: usize, path: &Path, reason: String) -> FileOutcome {
    FileOutcome {
        index,
        source_path: path.to_path_buf(),
        content_hash: None,
        archive_path: None,
        status: FileStatus::Failed(reason),
        warnings: Vec::new(),
    }
}

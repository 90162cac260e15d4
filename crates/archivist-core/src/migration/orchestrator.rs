use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

use super::backup;
use super::steps::migration_chain;
use super::{ensure_bookkeeping, MigrationStep, SchemaVersion};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::{BackupSnapshot, LedgerEntry};
use crate::storage::{CatalogLock, Database};

/// Where the orchestrator is in moving a catalog along the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Unknown,
    Identified {
        current: Option<SchemaVersion>,
        pending: usize,
    },
    BackingUp(SchemaVersion),
    Applying(SchemaVersion),
    Applied(SchemaVersion),
    UpToDate(Option<SchemaVersion>),
    Failed {
        version: SchemaVersion,
        reason: String,
    },
}

/// A chain step together with its ledger row, if applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub version: SchemaVersion,
    pub description: String,
    pub applied_at: Option<String>,
}

impl StepInfo {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Last step of the unbroken applied prefix of the chain.
    pub current: Option<SchemaVersion>,
    pub latest: SchemaVersion,
    pub pending: Vec<SchemaVersion>,
    /// Ledger rows that disagree with the shipped chain.
    pub issues: Vec<String>,
}

impl MigrationStatus {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty() && self.is_consistent()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Upgraded {
        applied: Vec<SchemaVersion>,
        snapshots: Vec<BackupSnapshot>,
    },
    NoOp {
        current: Option<SchemaVersion>,
    },
}

pub struct MigrationOrchestrator<'a> {
    db: &'a Database,
    backups_dir: PathBuf,
    steps: Vec<MigrationStep>,
    state: MigrationState,
}

impl<'a> MigrationOrchestrator<'a> {
    pub fn new(db: &'a Database, backups_dir: impl AsRef<Path>) -> Self {
        Self::with_steps(db, backups_dir, migration_chain())
    }

    /// Orchestrator over a custom chain. Steps must be in ascending version order.
    pub fn with_steps(db: &'a Database, backups_dir: impl AsRef<Path>, steps: Vec<MigrationStep>) -> Self {
        MigrationOrchestrator {
            db,
            backups_dir: backups_dir.as_ref().to_path_buf(),
            steps,
            state: MigrationState::Unknown,
        }
    }

    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    fn transition(&mut self, next: MigrationState) {
        debug!("Migration state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn latest(&self) -> Result<SchemaVersion, Error> {
        self.steps
            .last()
            .map(|s| s.version)
            .ok_or_else(|| Error::Other("migration chain is empty".to_string()))
    }

    fn ledger(&self) -> Result<Vec<LedgerEntry>, Error> {
        ensure_bookkeeping(self.db.connection())?;
        Ok(self.db.ledger_entries()?)
    }

    /// Read the ledger and compare it with the chain.
    pub fn status(&mut self) -> Result<MigrationStatus, Error> {
        let ledger = self.ledger()?;
        let latest = self.latest()?;
        let applied: HashMap<&str, &LedgerEntry> =
            ledger.iter().map(|e| (e.version.as_str(), e)).collect();

        let mut issues = Vec::new();
        for entry in &ledger {
            let known = entry
                .version
                .parse::<SchemaVersion>()
                .ok()
                .and_then(|v| self.steps.iter().find(|s| s.version == v));
            match known {
                None => issues.push(format!("ledger lists unknown version {}", entry.version)),
                Some(step) if step.checksum() != entry.checksum => issues.push(format!(
                    "step {} was changed after it was applied (checksum mismatch)",
                    step.version
                )),
                Some(_) => {}
            }
        }

        let mut current = None;
        let mut pending = Vec::new();
        for step in &self.steps {
            if applied.contains_key(step.version.to_string().as_str()) {
                if !pending.is_empty() {
                    issues.push(format!(
                        "step {} is applied but earlier step {} is not",
                        step.version, pending[0]
                    ));
                } else {
                    current = Some(step.version);
                }
            } else {
                pending.push(step.version);
            }
        }

        let status = MigrationStatus {
            current,
            latest,
            pending,
            issues,
        };
        self.transition(MigrationState::Identified {
            current: status.current,
            pending: status.pending.len(),
        });
        Ok(status)
    }

    /// The chain with applied/pending flags.
    pub fn list_steps(&self) -> Result<Vec<StepInfo>, Error> {
        let ledger = self.ledger()?;
        Ok(self
            .steps
            .iter()
            .map(|step| {
                let version = step.version.to_string();
                StepInfo {
                    version: step.version,
                    description: step.description.to_string(),
                    applied_at: ledger
                        .iter()
                        .find(|e| e.version == version)
                        .map(|e| e.applied_at.clone()),
                }
            })
            .collect())
    }

    /// Apply every pending step up to `target` (default: the latest), in order.
    ///
    /// With `backup`, each step is preceded by a verified snapshot; a snapshot that fails
    /// stops the chain before the step touches the catalog, reported as a failure of that step.
    pub fn upgrade(
        &mut self,
        target: Option<SchemaVersion>,
        backup: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<UpgradeOutcome, Error> {
        let _lock = CatalogLock::acquire(self.db)?;
        let status = self.status()?;
        if !status.is_consistent() {
            return Err(Error::LedgerInconsistent(status.issues.join("; ")));
        }

        let target = target.unwrap_or(status.latest);
        if !self.steps.iter().any(|s| s.version == target) {
            return Err(Error::UnknownSchemaVersion(target.to_string()));
        }

        let todo: Vec<MigrationStep> = self
            .steps
            .iter()
            .filter(|s| status.pending.contains(&s.version) && s.version <= target)
            .cloned()
            .collect();
        if todo.is_empty() {
            info!(
                "Catalog already at {}; nothing to migrate",
                status.current.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
            );
            self.transition(MigrationState::UpToDate(status.current));
            return Ok(UpgradeOutcome::NoOp {
                current: status.current,
            });
        }

        let start = Instant::now();
        let mut current = status.current;
        let mut applied = Vec::with_capacity(todo.len());
        let mut snapshots = Vec::new();

        for step in &todo {
            if backup {
                self.transition(MigrationState::BackingUp(step.version));
                match backup::snapshot(self.db, &self.backups_dir, "pre-migration", Some(step.version)) {
                    Ok(snapshot) => snapshots.push(snapshot),
                    Err(e) => {
                        let reason = format!("pre-migration snapshot failed: {e}");
                        error!("Migration {} not started: {}", step.version, reason);
                        self.transition(MigrationState::Failed {
                            version: step.version,
                            reason: reason.clone(),
                        });
                        return Err(Error::MigrationStepFailed {
                            version: step.version,
                            reason,
                            catalog_version: current,
                        });
                    }
                }
            }

            self.transition(MigrationState::Applying(step.version));
            reporter.on_migration_step(&step.version.to_string(), step.description);
            info!("Applying migration {}: {}", step.version, step.description);

            if let Err(e) = self.apply_step(step) {
                let reason = e.to_string();
                error!("Migration {} failed: {}", step.version, reason);
                self.transition(MigrationState::Failed {
                    version: step.version,
                    reason: reason.clone(),
                });
                return Err(Error::MigrationStepFailed {
                    version: step.version,
                    reason,
                    catalog_version: current,
                });
            }

            current = Some(step.version);
            applied.push(step.version);
            self.transition(MigrationState::Applied(step.version));
        }

        if current == Some(status.latest) {
            self.transition(MigrationState::UpToDate(current));
        }
        info!(
            "Applied {} migration(s) in {:.2}s",
            applied.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(UpgradeOutcome::Upgraded { applied, snapshots })
    }

    /// Transform and ledger row commit together or not at all.
    fn apply_step(&self, step: &MigrationStep) -> rusqlite::Result<()> {
        let tx = self.db.connection().unchecked_transaction()?;
        step.apply(&tx)?;
        self.db
            .insert_ledger_entry(&step.version.to_string(), step.description, &step.checksum())?;
        tx.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;

    #[test]
    fn test_fresh_catalog_has_everything_pending() {
        let db = Database::open_in_memory().unwrap();
        let mut orchestrator = MigrationOrchestrator::new(&db, "unused");
        let status = orchestrator.status().unwrap();
        assert_eq!(status.current, None);
        assert_eq!(status.pending.len(), migration_chain().len());
        assert!(status.is_consistent());
        assert!(!status.is_up_to_date());
        assert_eq!(
            orchestrator.state(),
            &MigrationState::Identified {
                current: None,
                pending: 5
            }
        );
    }

    #[test]
    fn test_upgrade_without_backup_then_noop() {
        let db = Database::open_in_memory().unwrap();
        let mut orchestrator = MigrationOrchestrator::new(&db, "unused");
        let outcome = orchestrator.upgrade(None, false, &SilentReporter).unwrap();
        match outcome {
            UpgradeOutcome::Upgraded { applied, snapshots } => {
                assert_eq!(applied.len(), 5);
                assert!(snapshots.is_empty());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            orchestrator.state(),
            &MigrationState::UpToDate(Some(SchemaVersion::new(0, 1, 4)))
        );

        let again = orchestrator.upgrade(None, false, &SilentReporter).unwrap();
        assert_eq!(
            again,
            UpgradeOutcome::NoOp {
                current: Some(SchemaVersion::new(0, 1, 4))
            }
        );
        assert!(orchestrator.list_steps().unwrap().iter().all(StepInfo::is_applied));
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut orchestrator = MigrationOrchestrator::new(&db, "unused");
        let result = orchestrator.upgrade(Some(SchemaVersion::new(0, 9, 0)), false, &SilentReporter);
        assert!(matches!(result, Err(Error::UnknownSchemaVersion(_))));
    }

    #[test]
    fn test_in_memory_backup_stops_before_first_step() {
        let db = Database::open_in_memory().unwrap();
        let mut orchestrator = MigrationOrchestrator::new(&db, "unused");
        let err = orchestrator.upgrade(None, true, &SilentReporter).unwrap_err();
        assert!(matches!(
            err,
            Error::MigrationStepFailed { version, catalog_version: None, .. }
                if version == SchemaVersion::new(0, 1, 0)
        ));
        assert!(err.to_string().contains("in-memory catalogs cannot be snapshotted"));
        assert!(matches!(orchestrator.state(), MigrationState::Failed { .. }));
        assert!(db.ledger_entries().unwrap().is_empty());
    }

    #[test]
    fn test_edited_step_makes_ledger_inconsistent() {
        let db = Database::open_in_memory().unwrap();
        MigrationOrchestrator::new(&db, "unused")
            .upgrade(None, false, &SilentReporter)
            .unwrap();

        let mut edited = migration_chain();
        edited[1].description = "Import batches, staging records and something new";
        let mut orchestrator = MigrationOrchestrator::with_steps(&db, "unused", edited);
        let status = orchestrator.status().unwrap();
        assert!(!status.is_consistent());
        assert!(matches!(
            orchestrator.upgrade(None, false, &SilentReporter),
            Err(Error::LedgerInconsistent(_))
        ));
    }
}

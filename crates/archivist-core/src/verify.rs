//! Post-ingest integrity checks. Read-only: drift is reported, never repaired.

use rayon::prelude::*;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::Error;
use crate::hasher::hash_file;
use crate::layout;
use crate::metadata::MediaCategory;
use crate::progress::ProgressReporter;
use crate::storage::models::AssetRef;
use crate::storage::Database;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyScope {
    All,
    Location(String),
    Batch(String),
}

/// An archived file whose bytes no longer match its catalog hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityMismatch {
    pub category: MediaCategory,
    pub content_hash: String,
    pub archive_path: String,
    /// `None` when the file exists but could not be read.
    pub actual_hash: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub ok: usize,
    pub mismatched: Vec<IntegrityMismatch>,
    pub missing: Vec<AssetRef>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }

    pub fn checked(&self) -> usize {
        self.ok + self.mismatched.len() + self.missing.len()
    }
}

enum Check {
    Ok,
    Missing,
    Mismatch(IntegrityMismatch),
}

/// Re-hash every committed asset in `scope` and compare with the catalog.
pub fn verify(
    db: &Database,
    archive_root: &Path,
    scope: &VerifyScope,
    reporter: &dyn ProgressReporter,
) -> Result<VerificationReport, Error> {
    let refs = match scope {
        VerifyScope::All => db.list_asset_refs(None, None)?,
        VerifyScope::Location(id) => db.list_asset_refs(Some(id), None)?,
        VerifyScope::Batch(id) => db.list_asset_refs(None, Some(id))?,
    };

    let total = refs.len();
    let start = Instant::now();
    reporter.on_verify_start(total);
    let done = AtomicUsize::new(0);

    let checks: Vec<Check> = refs
        .par_iter()
        .map(|asset| {
            let check = check_asset(archive_root, asset);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.on_verify_progress(n, total);
            check
        })
        .collect();

    let mut report = VerificationReport::default();
    for (asset, check) in refs.into_iter().zip(checks) {
        match check {
            Check::Ok => report.ok += 1,
            Check::Missing => {
                warn!("Missing archive file {}", asset.archive_path);
                report.missing.push(asset);
            }
            Check::Mismatch(mismatch) => {
                warn!(
                    "Integrity mismatch for {}: expected {}",
                    mismatch.archive_path, mismatch.content_hash
                );
                report.mismatched.push(mismatch);
            }
        }
    }

    reporter.on_verify_complete(
        report.mismatched.len(),
        report.missing.len(),
        start.elapsed().as_secs_f64(),
    );
    info!(
        "Verified {} assets: {} ok, {} mismatched, {} missing",
        total,
        report.ok,
        report.mismatched.len(),
        report.missing.len()
    );
    Ok(report)
}

fn check_asset(archive_root: &Path, asset: &AssetRef) -> Check {
    let path = layout::to_absolute(archive_root, &asset.archive_path);
    let mismatch = |actual_hash: Option<String>, detail: Option<String>| {
        Check::Mismatch(IntegrityMismatch {
            category: asset.category,
            content_hash: asset.content_hash.clone(),
            archive_path: asset.archive_path.clone(),
            actual_hash,
            detail,
        })
    };

    match hash_file(&path) {
        Ok(actual) if actual.full_hash() == asset.content_hash => Check::Ok,
        Ok(actual) => mismatch(Some(actual.full_hash().to_string()), None),
        Err(e) if e.kind() == ErrorKind::NotFound => Check::Missing,
        Err(e) => mismatch(None, Some(e.to_string())),
    }
}

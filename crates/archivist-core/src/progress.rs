/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars; embedders can forward it anywhere.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_hash_start(&self, _total_files: usize) {}
    fn on_hash_progress(&self, _files_hashed: usize, _total_files: usize) {}
    fn on_hash_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_ingest_start(&self, _pending: usize) {}
    fn on_ingest_progress(&self, _done: usize, _pending: usize) {}
    fn on_ingest_complete(&self, _imported: usize, _duration_secs: f64) {}
    fn on_verify_start(&self, _total_assets: usize) {}
    fn on_verify_progress(&self, _checked: usize, _total_assets: usize) {}
    fn on_verify_complete(&self, _mismatched: usize, _missing: usize, _duration_secs: f64) {}
    fn on_migration_step(&self, _version: &str, _description: &str) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

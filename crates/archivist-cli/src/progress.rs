use archivist_core::ProgressReporter;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Hash phase: bar over the submitted files
/// - Ingest phase: bar over pending staged files
/// - Verify phase: bar over the assets being re-hashed
/// - Migration steps: one line per step
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, label: &str, total: usize) {
        let template = format!(
            "  {{spinner:.cyan}} {label} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICKS);
        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn set_position(&self, done: usize, total: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if pb.length() != Some(total as u64) {
                    pb.set_length(total as u64);
                }
                pb.set_position(done as u64);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_hash_start(&self, total_files: usize) {
        self.start_bar("Hashing", total_files);
    }

    fn on_hash_progress(&self, files_hashed: usize, total_files: usize) {
        self.set_position(files_hashed, total_files);
    }

    fn on_hash_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Hashed {} files in {:.2}s",
            "✓".green(),
            total_files,
            duration_secs
        );
    }

    fn on_ingest_start(&self, pending: usize) {
        self.start_bar("Archiving", pending);
    }

    fn on_ingest_progress(&self, done: usize, pending: usize) {
        self.set_position(done, pending);
    }

    fn on_ingest_complete(&self, imported: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Archived {} files in {:.2}s",
            "✓".green(),
            imported,
            duration_secs
        );
    }

    fn on_verify_start(&self, total_assets: usize) {
        self.start_bar("Verifying", total_assets);
    }

    fn on_verify_progress(&self, checked: usize, total_assets: usize) {
        self.set_position(checked, total_assets);
    }

    fn on_verify_complete(&self, mismatched: usize, missing: usize, duration_secs: f64) {
        self.finish_bar();
        let mark = if mismatched == 0 && missing == 0 {
            "✓".green()
        } else {
            "✗".red()
        };
        eprintln!(
            "  {} Verification: {} mismatched, {} missing in {:.2}s",
            mark, mismatched, missing, duration_secs
        );
    }

    fn on_migration_step(&self, version: &str, description: &str) {
        eprintln!("  {} {} {}", "→".cyan(), version.bold(), description);
    }
}

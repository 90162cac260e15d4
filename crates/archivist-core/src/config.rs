use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::metadata::hardware::HardwareRule;
use crate::metadata::MediaCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the canonical archive tree.
    pub archive_root: PathBuf,
    /// SQLite catalog file.
    pub catalog_path: PathBuf,
    /// Where catalog snapshots are written before migrations and destructive removals.
    pub backups_dir: PathBuf,
    pub extensions: ExtensionAllowList,
    pub hardware: Vec<HardwareRule>,
    /// Upper bound on short-id regeneration attempts.
    pub max_id_attempts: u32,
    pub exiftool_path: String,
    pub ffprobe_path: String,
    /// Hard link imported files into the archive when possible; `false` always copies.
    pub link_files: bool,
    /// Upgrade the catalog (with snapshots) whenever it is opened.
    pub auto_migrate: bool,
    /// Snapshots kept by `prune_snapshots`; 0 keeps everything.
    pub snapshot_keep: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archive_root: PathBuf::from("archive"),
            catalog_path: PathBuf::from("archivist.db"),
            backups_dir: PathBuf::from("backups"),
            extensions: ExtensionAllowList::default(),
            hardware: crate::metadata::hardware::default_rules(),
            max_id_attempts: crate::identity::DEFAULT_MAX_ID_ATTEMPTS,
            exiftool_path: "exiftool".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            link_files: true,
            auto_migrate: true,
            snapshot_keep: 0,
            ignore_patterns: vec!["**/.DS_Store".to_string(), "**/Thumbs.db".to_string()],
        }
    }
}

/// Extensions accepted per category, lower-case and without the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionAllowList {
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub documents: Vec<String>,
}

impl Default for ExtensionAllowList {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            images: owned(&[
                "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "nef",
                "cr2", "cr3", "arw", "dng", "orf", "raf", "rw2",
            ]),
            videos: owned(&[
                "mp4", "mov", "avi", "mkv", "m4v", "mts", "m2ts", "wmv", "webm", "3gp", "mpg",
                "mpeg",
            ]),
            documents: owned(&[
                "pdf", "txt", "md", "doc", "docx", "rtf", "odt", "xls", "xlsx", "csv", "html",
                "htm", "mhtml", "warc", "epub",
            ]),
        }
    }
}

impl ExtensionAllowList {
    /// Classify an extension, case-insensitively. `None` means the type is not accepted.
    pub fn classify(&self, extension: &str) -> Option<MediaCategory> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        let contains = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(&ext));
        if contains(&self.images) {
            Some(MediaCategory::Image)
        } else if contains(&self.videos) {
            Some(MediaCategory::Video)
        } else if contains(&self.documents) {
            Some(MediaCategory::Document)
        } else {
            None
        }
    }

    pub fn classify_path(&self, path: &Path) -> Option<MediaCategory> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.classify(e))
    }
}

/// Load `Config.toml` from the working directory (optional), overridden by
/// `ARCHIVIST__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("ARCHIVIST").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Remove directories that are subdirectories of other directories in the list,
/// so that a directory import never visits the same file twice.
pub fn non_overlapping_directories(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if result.iter().any(|kept| dir.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(&dir));
        result.push(dir);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_overlapping_no_overlap() {
        let dirs = vec![
            PathBuf::from("/home/user/photos"),
            PathBuf::from("/home/user/docs"),
            PathBuf::from("/var/data"),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = vec![
            PathBuf::from("/home/user/docs"),
            PathBuf::from("/home/user"),
            PathBuf::from("/var/data"),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&PathBuf::from("/home/user")));
        assert!(!result.contains(&PathBuf::from("/home/user/docs")));
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let allow = ExtensionAllowList::default();
        assert_eq!(allow.classify("JPG"), Some(MediaCategory::Image));
        assert_eq!(allow.classify(".mov"), Some(MediaCategory::Video));
        assert_eq!(allow.classify("Pdf"), Some(MediaCategory::Document));
        assert_eq!(allow.classify("exe"), None);
    }

    #[test]
    fn test_classify_path_without_extension() {
        let allow = ExtensionAllowList::default();
        assert_eq!(allow.classify_path(Path::new("/tmp/README")), None);
    }
}

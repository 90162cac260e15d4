use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::config::non_overlapping_directories;

/// Expand import roots into a sorted, de-duplicated file list.
///
/// Plain files are taken as given. Directories are walked recursively, skipping
/// symlinks, 0-byte files and anything matching an ignore glob.
pub fn collect_import_files(roots: &[PathBuf], ignore_globs: &[String]) -> io::Result<Vec<PathBuf>> {
    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) = roots.iter().cloned().partition(|p| p.is_dir());

    let mut collected = Vec::new();
    for file in files {
        if !file.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Import path {} does not exist", file.display()),
            ));
        }
        collected.push(file);
    }

    for dir in non_overlapping_directories(dirs) {
        visit_dir(&dir, &ignore_patterns, &mut collected)?;
    }

    collected.sort();
    collected.dedup();
    debug!("Collected {} import candidates", collected.len());
    Ok(collected)
}

fn is_ignored(path: &Path, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|pattern| {
        pattern.matches_path(path)
            || path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| pattern.matches(name))
    })
}

fn visit_dir(root: &Path, patterns: &[Pattern], out: &mut Vec<PathBuf>) -> io::Result<()> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry.path(), patterns));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.io_error().map(|e| e.kind()) == Some(io::ErrorKind::PermissionDenied) {
                    error!("Access denied while walking {}: {}", root.display(), err);
                    continue;
                }
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("Error walking {}: {}", root.display(), err),
                ));
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if len > 0 {
            out.push(entry.into_path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_walks_sorted_and_skips_empty_and_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("trip/day2")).unwrap();
        fs::write(root.join("trip/b.jpg"), b"b").unwrap();
        fs::write(root.join("trip/a.jpg"), b"a").unwrap();
        fs::write(root.join("trip/day2/c.mp4"), b"c").unwrap();
        fs::write(root.join("trip/empty.jpg"), b"").unwrap();
        fs::write(root.join("trip/.DS_Store"), b"junk").unwrap();

        let files = collect_import_files(&[root.join("trip")], &["**/.DS_Store".to_string()]).unwrap();
        assert_eq!(
            files,
            vec![
                root.join("trip/a.jpg"),
                root.join("trip/b.jpg"),
                root.join("trip/day2/c.mp4"),
            ]
        );
    }

    #[test]
    fn test_nested_roots_are_not_walked_twice() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(root.join("inner")).unwrap();
        fs::write(root.join("inner/x.png"), b"x").unwrap();

        let files = collect_import_files(&[root.clone(), root.join("inner")], &[]).unwrap();
        assert_eq!(files, vec![root.join("inner/x.png")]);
    }

    #[test]
    fn test_missing_file_root_is_an_error() {
        let result = collect_import_files(&[PathBuf::from("/nonexistent/file.jpg")], &[]);
        assert!(result.is_err());
    }
}

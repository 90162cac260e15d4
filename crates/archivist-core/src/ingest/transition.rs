//! Moving bytes into the archive tree without ever touching the source.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;
use crate::hasher::{hash_file, ContentIdentity};
use crate::platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMethod {
    HardLink,
    Copy,
    /// An identical file was already at the destination.
    AlreadyPresent,
}

/// A file put in place by [`place_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub destination: PathBuf,
    pub method: TransitionMethod,
}

impl Placement {
    /// Whether the file at `destination` was created by this placement.
    pub fn created(&self) -> bool {
        self.method != TransitionMethod::AlreadyPresent
    }

    /// Undo the placement. Files that were already there are left alone.
    pub fn revert(&self) -> Result<(), Error> {
        if !self.created() {
            return Ok(());
        }
        match fs::remove_file(&self.destination) {
            Ok(()) => {
                debug!("Removed {}", self.destination.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Hard link `source` to `destination` when `allow_link` is set, falling back to a copy.
///
/// An existing destination is accepted only if its content hash matches `expected`.
pub fn place_file(
    source: &Path,
    destination: &Path,
    expected: &ContentIdentity,
    expected_size: u64,
    allow_link: bool,
) -> Result<Placement, Error> {
    let fail = |reason: String| Error::FilesystemTransitionFailed {
        content_hash: expected.full_hash().to_string(),
        destination: destination.to_path_buf(),
        reason,
    };

    if destination.exists() {
        let existing = hash_file(destination).map_err(|e| fail(format!("cannot read existing file: {e}")))?;
        if &existing == expected {
            debug!("{} already in place", destination.display());
            return Ok(Placement {
                destination: destination.to_path_buf(),
                method: TransitionMethod::AlreadyPresent,
            });
        }
        return Err(fail(format!(
            "destination holds different content ({})",
            existing.short_hash()
        )));
    }

    let parent = destination
        .parent()
        .ok_or_else(|| fail("destination has no parent directory".to_string()))?;
    fs::create_dir_all(parent).map_err(|e| fail(format!("cannot create directory: {e}")))?;

    let linkable =
        allow_link && platform::same_volume(source, parent).unwrap_or(None) != Some(false);
    if linkable {
        match fs::hard_link(source, destination) {
            Ok(()) => {
                return Ok(Placement {
                    destination: destination.to_path_buf(),
                    method: TransitionMethod::HardLink,
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(fail("destination appeared during placement".to_string()))
            }
            Err(e) => debug!("Hard link to {} failed ({}), copying", destination.display(), e),
        }
    }

    copy_into_place(source, destination, expected_size).map_err(fail)?;
    Ok(Placement {
        destination: destination.to_path_buf(),
        method: TransitionMethod::Copy,
    })
}

/// Copy through a temporary sibling so a half-written file never carries the final name.
fn copy_into_place(source: &Path, destination: &Path, expected_size: u64) -> Result<(), String> {
    let partial = partial_path(destination);
    let copied = fs::copy(source, &partial).map_err(|e| format!("copy failed: {e}"))?;
    if copied != expected_size {
        let _ = fs::remove_file(&partial);
        return Err(format!(
            "copied {copied} bytes, expected {expected_size}"
        ));
    }
    if let Err(e) = fs::rename(&partial, destination) {
        let _ = fs::remove_file(&partial);
        return Err(format!("rename failed: {e}"));
    }
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    name.push(".partial");
    destination.with_file_name(name)
}

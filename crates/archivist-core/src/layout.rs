//! Canonical archive layout.
//!
//! `locations/{loc-slug}-{loc8}[/{sub-slug}-{sub8}]/{images|videos|documents}[/{hardware}]`
//!
//! Everything here is string computation. The ingestor relies on the same inputs
//! always producing the same path so that a retried record lands where the first
//! attempt would have.

use std::path::{Path, PathBuf};

use crate::identity::derive_filename;
use crate::metadata::MediaCategory;
use crate::storage::models::{Location, SubLocation};

pub const LOCATIONS_DIR: &str = "locations";

/// Lower-case ASCII slug: alphanumerics kept, every other run collapsed to one dash.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Folder for an asset, relative to the archive root.
pub fn resolve_folder(
    location: &Location,
    sub_location: Option<&SubLocation>,
    category: MediaCategory,
    hardware_class: Option<&str>,
) -> PathBuf {
    let mut path = PathBuf::from(LOCATIONS_DIR);
    path.push(format!("{}-{}", slugify(&location.name), location.short_id));
    if let Some(sub) = sub_location {
        path.push(format!("{}-{}", slugify(&sub.name), sub.short_id));
    }
    path.push(category.folder_name());
    if let Some(class) = hardware_class.filter(|c| !c.trim().is_empty()) {
        path.push(slugify(class));
    }
    path
}

/// Full relative path (folder + contract filename) for a piece of content.
pub fn resolve_asset_path(
    location: &Location,
    sub_location: Option<&SubLocation>,
    category: MediaCategory,
    hardware_class: Option<&str>,
    content_short: &str,
    extension: &str,
) -> PathBuf {
    let folder = resolve_folder(location, sub_location, category, hardware_class);
    let filename = derive_filename(
        &location.short_id,
        content_short,
        extension,
        sub_location.map(|s| s.short_id.as_str()),
    );
    folder.join(filename)
}

/// Stored form of a relative archive path: forward slashes on every platform.
pub fn to_catalog_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Absolute path of a stored archive path under `archive_root`.
pub fn to_absolute(archive_root: &Path, catalog_path: &str) -> PathBuf {
    catalog_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(archive_root.to_path_buf(), |acc, part| acc.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Location {
        Location {
            id: "0b1c2d3e-aaaa-4bbb-8ccc-000000000001".to_string(),
            short_id: "0b1c2d3e".to_string(),
            name: "Old Mill & Dam".to_string(),
            region: Some("NY".to_string()),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn sub_location() -> SubLocation {
        SubLocation {
            id: "9f8e7d6c-aaaa-4bbb-8ccc-000000000002".to_string(),
            short_id: "9f8e7d6c".to_string(),
            location_id: location().id,
            name: "Boiler Room".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Old Mill & Dam"), "old-mill-dam");
        assert_eq!(slugify("  --  "), "unnamed");
        assert_eq!(slugify("St. Mary's (1890)"), "st-mary-s-1890");
    }

    #[test]
    fn test_location_only_folder() {
        let path = resolve_folder(&location(), None, MediaCategory::Image, None);
        assert_eq!(path, PathBuf::from("locations/old-mill-dam-0b1c2d3e/images"));
    }

    #[test]
    fn test_sub_location_and_hardware() {
        let sub = sub_location();
        let path = resolve_folder(&location(), Some(&sub), MediaCategory::Video, Some("Drone"));
        assert_eq!(
            path,
            PathBuf::from("locations/old-mill-dam-0b1c2d3e/boiler-room-9f8e7d6c/videos/drone")
        );
    }

    #[test]
    fn test_blank_hardware_is_ignored() {
        let path = resolve_folder(&location(), None, MediaCategory::Document, Some("  "));
        assert_eq!(path, PathBuf::from("locations/old-mill-dam-0b1c2d3e/documents"));
    }

    #[test]
    fn test_asset_path_is_deterministic() {
        let sub = sub_location();
        let a = resolve_asset_path(&location(), Some(&sub), MediaCategory::Image, None, "deadbeef", "JPG");
        let b = resolve_asset_path(&location(), Some(&sub), MediaCategory::Image, None, "deadbeef", "JPG");
        assert_eq!(a, b);
        assert_eq!(
            to_catalog_path(&a),
            "locations/old-mill-dam-0b1c2d3e/boiler-room-9f8e7d6c/images/0b1c2d3e-9f8e7d6c-deadbeef.jpg"
        );
    }

    #[test]
    fn test_absolute_round_trip() {
        let rel = resolve_asset_path(&location(), None, MediaCategory::Image, None, "deadbeef", "png");
        let stored = to_catalog_path(&rel);
        let abs = to_absolute(Path::new("/archive"), &stored);
        assert_eq!(abs, Path::new("/archive").join(&rel));
    }
}

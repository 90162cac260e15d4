pub mod document;
pub mod hardware;
pub mod photo;
pub mod probe;
pub mod video;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::config::AppConfig;
use hardware::HardwareTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
    Document,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 3] = [
        MediaCategory::Image,
        MediaCategory::Video,
        MediaCategory::Document,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Document => "document",
        }
    }

    /// Catalog table holding assets of this category.
    pub fn table_name(self) -> &'static str {
        match self {
            MediaCategory::Image => "images",
            MediaCategory::Video => "videos",
            MediaCategory::Document => "documents",
        }
    }

    /// Folder name inside a location in the archive tree.
    pub fn folder_name(self) -> &'static str {
        self.table_name()
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(MediaCategory::Image),
            "video" | "videos" => Ok(MediaCategory::Video),
            "document" | "documents" => Ok(MediaCategory::Document),
            other => Err(format!("unknown media category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `YYYY-MM-DDTHH:MM:SS`, camera-local time.
    pub captured_at: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub hardware_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration_secs: Option<f64>,
    pub codec: Option<String>,
    pub frame_rate: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub captured_at: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub hardware_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub mime_type: Option<String>,
}

/// Category-specific descriptive attributes of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum AssetMetadata {
    Image(ImageMetadata),
    Video(VideoMetadata),
    Document(DocumentMetadata),
}

impl AssetMetadata {
    /// All-null metadata for a category.
    pub fn empty(category: MediaCategory) -> Self {
        match category {
            MediaCategory::Image => AssetMetadata::Image(ImageMetadata::default()),
            MediaCategory::Video => AssetMetadata::Video(VideoMetadata::default()),
            MediaCategory::Document => AssetMetadata::Document(DocumentMetadata::default()),
        }
    }

    pub fn category(&self) -> MediaCategory {
        match self {
            AssetMetadata::Image(_) => MediaCategory::Image,
            AssetMetadata::Video(_) => MediaCategory::Video,
            AssetMetadata::Document(_) => MediaCategory::Document,
        }
    }

    pub fn hardware_class(&self) -> Option<&str> {
        match self {
            AssetMetadata::Image(m) => m.hardware_class.as_deref(),
            AssetMetadata::Video(m) => m.hardware_class.as_deref(),
            AssetMetadata::Document(_) => None,
        }
    }
}

/// Something about a file could not be read. The file is still archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub message: String,
}

impl ExtractionWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub metadata: AssetMetadata,
    pub warnings: Vec<ExtractionWarning>,
}

/// Reads descriptive attributes from files. Never writes to them.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    exiftool: String,
    ffprobe: String,
    hardware: HardwareTable,
}

impl MetadataExtractor {
    pub fn new(exiftool: impl Into<String>, ffprobe: impl Into<String>, hardware: HardwareTable) -> Self {
        Self {
            exiftool: exiftool.into(),
            ffprobe: ffprobe.into(),
            hardware,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.exiftool_path.clone(),
            config.ffprobe_path.clone(),
            HardwareTable::new(config.hardware.clone()),
        )
    }

    pub fn extract(&self, path: &Path, category: MediaCategory) -> Extraction {
        let mut warnings = Vec::new();
        let metadata = match category {
            MediaCategory::Image => AssetMetadata::Image(photo::extract(
                path,
                &self.exiftool,
                &self.hardware,
                &mut warnings,
            )),
            MediaCategory::Video => AssetMetadata::Video(video::extract(
                path,
                &self.ffprobe,
                &self.hardware,
                &mut warnings,
            )),
            MediaCategory::Document => {
                AssetMetadata::Document(document::extract(path, &mut warnings))
            }
        };
        for warning in &warnings {
            warn!("Metadata warning for '{}': {}", path.display(), warning);
        }
        Extraction { metadata, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in MediaCategory::ALL {
            assert_eq!(category.as_str().parse::<MediaCategory>(), Ok(category));
            assert_eq!(category.table_name().parse::<MediaCategory>(), Ok(category));
        }
        assert!("audio".parse::<MediaCategory>().is_err());
    }

    #[test]
    fn test_empty_metadata_matches_category() {
        for category in MediaCategory::ALL {
            let m = AssetMetadata::empty(category);
            assert_eq!(m.category(), category);
            assert_eq!(m.hardware_class(), None);
        }
    }
}

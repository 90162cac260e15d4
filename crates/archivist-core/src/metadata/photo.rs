use chrono::NaiveDateTime;
use serde_json::Value;
use std::path::Path;

use super::hardware::HardwareTable;
use super::probe::{run_json_tool, str_field, u32_field, ProbeOutcome};
use super::{ExtractionWarning, ImageMetadata};

const EXIFTOOL_ARGS: &[&str] = &[
    "-json",
    "-n",
    "-DateTimeOriginal",
    "-CreateDate",
    "-Make",
    "-Model",
    "-ImageWidth",
    "-ImageHeight",
];

pub(super) fn extract(
    path: &Path,
    exiftool: &str,
    hardware: &HardwareTable,
    warnings: &mut Vec<ExtractionWarning>,
) -> ImageMetadata {
    let mut meta = ImageMetadata::default();

    let decoded = decoded_dimensions(path);
    if let Ok((w, h)) = decoded {
        meta.width = Some(w);
        meta.height = Some(h);
    }

    match run_json_tool(exiftool, EXIFTOOL_ARGS, path) {
        ProbeOutcome::Output(value) => {
            if let Some(tags) = first_entry(&value) {
                apply_exif(&mut meta, tags);
            }
        }
        ProbeOutcome::Failed(reason) => warnings.push(ExtractionWarning::new(reason)),
        ProbeOutcome::Unavailable => {}
    }

    if meta.width.is_none() {
        if let Err(reason) = decoded {
            warnings.push(ExtractionWarning::new(format!(
                "could not read image dimensions: {reason}"
            )));
        }
    }

    meta.hardware_class = hardware.classify(meta.camera_make.as_deref(), meta.camera_model.as_deref());
    meta
}

fn decoded_dimensions(path: &Path) -> Result<(u32, u32), String> {
    ::image::ImageReader::open(path)
        .map_err(|e| e.to_string())?
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

/// exiftool prints a one-element array per file.
fn first_entry(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(entries) => entries.first(),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

fn apply_exif(meta: &mut ImageMetadata, tags: &Value) {
    meta.camera_make = str_field(tags, "Make");
    meta.camera_model = str_field(tags, "Model");
    meta.captured_at = str_field(tags, "DateTimeOriginal")
        .or_else(|| str_field(tags, "CreateDate"))
        .and_then(|raw| parse_exif_datetime(&raw));
    if meta.width.is_none() {
        meta.width = u32_field(tags, "ImageWidth");
        meta.height = u32_field(tags, "ImageHeight");
    }
}

/// EXIF dates look like `2021:06:30 14:05:09`, sometimes with sub-seconds or
/// an offset appended. Only the wall-clock part is kept.
pub(crate) fn parse_exif_datetime(raw: &str) -> Option<String> {
    let head = raw.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::hardware::default_rules;
    use serde_json::json;

    #[test]
    fn test_parse_exif_datetime() {
        assert_eq!(
            parse_exif_datetime("2021:06:30 14:05:09"),
            Some("2021-06-30T14:05:09".to_string())
        );
        assert_eq!(
            parse_exif_datetime("2021:06:30 14:05:09.123+02:00"),
            Some("2021-06-30T14:05:09".to_string())
        );
        assert_eq!(parse_exif_datetime("0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_datetime("yesterday"), None);
    }

    #[test]
    fn test_apply_exif_fills_missing_dimensions() {
        let mut meta = ImageMetadata::default();
        let tags = json!({
            "SourceFile": "x.nef",
            "Make": "NIKON CORPORATION",
            "Model": "NIKON D750",
            "DateTimeOriginal": "2019:01:02 03:04:05",
            "ImageWidth": 6016,
            "ImageHeight": 4016
        });
        apply_exif(&mut meta, &tags);
        assert_eq!(meta.width, Some(6016));
        assert_eq!(meta.height, Some(4016));
        assert_eq!(meta.captured_at.as_deref(), Some("2019-01-02T03:04:05"));
    }

    #[test]
    fn test_png_dimensions_without_exiftool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        ::image::RgbImage::new(3, 2).save(&path).unwrap();

        let mut warnings = Vec::new();
        let meta = extract(&path, "", &HardwareTable::new(default_rules()), &mut warnings);
        assert_eq!(meta.width, Some(3));
        assert_eq!(meta.height, Some(2));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_corrupt_image_warns_and_stays_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let mut warnings = Vec::new();
        let meta = extract(&path, "", &HardwareTable::new(default_rules()), &mut warnings);
        assert_eq!(meta, ImageMetadata::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("image dimensions"));
    }
}

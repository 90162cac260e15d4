use chrono::DateTime;
use serde_json::Value;
use std::path::Path;

use super::hardware::HardwareTable;
use super::probe::{f64_field, run_json_tool, str_field, u32_field, ProbeOutcome};
use super::{ExtractionWarning, VideoMetadata};

const FFPROBE_ARGS: &[&str] = &[
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

pub(super) fn extract(
    path: &Path,
    ffprobe: &str,
    hardware: &HardwareTable,
    warnings: &mut Vec<ExtractionWarning>,
) -> VideoMetadata {
    match run_json_tool(ffprobe, FFPROBE_ARGS, path) {
        ProbeOutcome::Output(probe) => {
            let meta = from_probe(&probe, hardware);
            if meta.codec.is_none() {
                warnings.push(ExtractionWarning::new("ffprobe found no video stream"));
            }
            meta
        }
        ProbeOutcome::Failed(reason) => {
            warnings.push(ExtractionWarning::new(reason));
            VideoMetadata::default()
        }
        ProbeOutcome::Unavailable => VideoMetadata::default(),
    }
}

pub(crate) fn from_probe(probe: &Value, hardware: &HardwareTable) -> VideoMetadata {
    let mut meta = VideoMetadata::default();
    let format = probe.get("format");

    let stream = probe
        .get("streams")
        .and_then(Value::as_array)
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.get("codec_type").and_then(Value::as_str) == Some("video"))
        });

    if let Some(stream) = stream {
        meta.codec = str_field(stream, "codec_name");
        meta.width = u32_field(stream, "width");
        meta.height = u32_field(stream, "height");
        meta.frame_rate = str_field(stream, "avg_frame_rate")
            .and_then(|r| parse_rational(&r))
            .or_else(|| str_field(stream, "r_frame_rate").and_then(|r| parse_rational(&r)));
        meta.duration_secs = f64_field(stream, "duration");
    }

    if let Some(format) = format {
        if meta.duration_secs.is_none() {
            meta.duration_secs = f64_field(format, "duration");
        }
        if let Some(tags) = format.get("tags") {
            meta.captured_at = str_field(tags, "creation_time")
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string());
            meta.camera_make = str_field(tags, "com.apple.quicktime.make")
                .or_else(|| str_field(tags, "make"));
            meta.camera_model = str_field(tags, "com.apple.quicktime.model")
                .or_else(|| str_field(tags, "model"));
        }
    }

    meta.hardware_class = hardware.classify(meta.camera_make.as_deref(), meta.camera_model.as_deref());
    meta
}

/// ffprobe frame rates are fractions like `30000/1001`; `0/0` means unknown.
fn parse_rational(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num == 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::hardware::default_rules;
    use serde_json::json;

    #[test]
    fn test_parse_rational() {
        let fps = parse_rational("30000/1001").unwrap();
        assert!((fps - 29.97).abs() < 0.01);
        assert_eq!(parse_rational("25/1"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("abc"), None);
    }

    #[test]
    fn test_from_probe_iphone_clip() {
        let probe = json!({
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "hevc", "width": 1920, "height": 1080,
                 "avg_frame_rate": "30/1", "duration": "12.500000"}
            ],
            "format": {
                "duration": "12.6",
                "tags": {
                    "creation_time": "2022-08-14T17:45:10.000000Z",
                    "com.apple.quicktime.make": "Apple",
                    "com.apple.quicktime.model": "iPhone 12"
                }
            }
        });
        let meta = from_probe(&probe, &HardwareTable::new(default_rules()));
        assert_eq!(meta.codec.as_deref(), Some("hevc"));
        assert_eq!(meta.width, Some(1920));
        assert_eq!(meta.frame_rate, Some(30.0));
        assert_eq!(meta.duration_secs, Some(12.5));
        assert_eq!(meta.captured_at.as_deref(), Some("2022-08-14T17:45:10"));
        assert_eq!(meta.hardware_class.as_deref(), Some("phone"));
    }

    #[test]
    fn test_from_probe_without_video_stream() {
        let probe = json!({"streams": [], "format": {"duration": "3.0"}});
        let meta = from_probe(&probe, &HardwareTable::default());
        assert_eq!(meta.codec, None);
        assert_eq!(meta.duration_secs, Some(3.0));
    }
}

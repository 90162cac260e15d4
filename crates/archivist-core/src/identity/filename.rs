/// Archive filename for a piece of content.
///
/// `{loc8}-{sha8}.{ext}` or, with a sub-location, `{loc8}-{sub8}-{sha8}.{ext}`.
/// Consumers parse these names, so the shape must not change. The extension
/// is lower-cased and any leading dot dropped.
pub fn derive_filename(
    location_short: &str,
    content_short: &str,
    extension: &str,
    sub_location_short: Option<&str>,
) -> String {
    let ext = extension.trim_start_matches('.').to_lowercase();
    match sub_location_short {
        Some(sub) => format!("{location_short}-{sub}-{content_short}.{ext}"),
        None => format!("{location_short}-{content_short}.{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_only() {
        assert_eq!(
            derive_filename("a1b2c3d4", "deadbeef", "jpg", None),
            "a1b2c3d4-deadbeef.jpg"
        );
    }

    #[test]
    fn test_with_sub_location() {
        assert_eq!(
            derive_filename("a1b2c3d4", "deadbeef", "mp4", Some("0f0f0f0f")),
            "a1b2c3d4-0f0f0f0f-deadbeef.mp4"
        );
    }

    #[test]
    fn test_extension_lowercased() {
        assert_eq!(
            derive_filename("a1b2c3d4", "deadbeef", ".JPeG", None),
            "a1b2c3d4-deadbeef.jpeg"
        );
    }

    #[test]
    fn test_deterministic() {
        let a = derive_filename("11111111", "22222222", "NEF", Some("33333333"));
        let b = derive_filename("11111111", "22222222", "NEF", Some("33333333"));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }
}

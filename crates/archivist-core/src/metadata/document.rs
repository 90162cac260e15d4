use std::path::Path;

use super::{DocumentMetadata, ExtractionWarning};

pub(super) fn extract(path: &Path, warnings: &mut Vec<ExtractionWarning>) -> DocumentMetadata {
    let sniffed = match infer::get_from_path(path) {
        Ok(kind) => kind.map(|k| k.mime_type().to_string()),
        Err(e) => {
            warnings.push(ExtractionWarning::new(format!(
                "could not read file header: {e}"
            )));
            None
        }
    };

    DocumentMetadata {
        mime_type: sniffed.or_else(|| mime_from_extension(path).map(str::to_string)),
    }
}

/// Plain-text formats have no magic bytes, so fall back to the extension.
fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "mhtml" => "multipart/related",
        "warc" => "application/warc",
        "rtf" => "application/rtf",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniffs_pdf_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bin");
        std::fs::write(&path, b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").unwrap();
        let mut warnings = Vec::new();
        let meta = extract(&path, &mut warnings);
        assert_eq!(meta.mime_type.as_deref(), Some("application/pdf"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_text_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# field notes").unwrap();
        let mut warnings = Vec::new();
        let meta = extract(&path, &mut warnings);
        assert_eq!(meta.mime_type.as_deref(), Some("text/markdown"));
    }

    #[test]
    fn test_unreadable_file_warns() {
        let mut warnings = Vec::new();
        let meta = extract(Path::new("/nonexistent/file.pdf"), &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert_eq!(meta.mime_type.as_deref(), Some("application/pdf"));
    }
}

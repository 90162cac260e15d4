use std::io;
use std::path::Path;

/// Whether two paths live on the same filesystem, `None` where the platform cannot tell.
///
/// `dest_dir` must exist. Hard links only work within one filesystem.
#[cfg(unix)]
pub fn same_volume(source: &Path, dest_dir: &Path) -> io::Result<Option<bool>> {
    use std::os::unix::fs::MetadataExt;

    let src = std::fs::metadata(source)?;
    let dst = std::fs::metadata(dest_dir)?;
    Ok(Some(src.dev() == dst.dev()))
}

#[cfg(not(unix))]
pub fn same_volume(_source: &Path, _dest_dir: &Path) -> io::Result<Option<bool>> {
    Ok(None)
}

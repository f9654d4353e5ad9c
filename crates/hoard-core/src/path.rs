use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Normalise a relative file name coming from a manifest or a remote listing.
///
/// Backslashes become `/`. Absolute paths, `..` segments and empty segments
/// are rejected so a manifest entry can never escape its root directory.
pub fn sanitize_rel(input: &str) -> CoreResult<String> {
    let s = input.replace('\\', "/");
    if s.is_empty() || s.starts_with('/') || s.split('/').any(|seg| seg.is_empty() || seg == "..") {
        return Err(CoreError::InvalidPath(input.to_string()));
    }
    Ok(s)
}

/// Join a sanitised relative name onto `base`.
pub fn join_rel(base: &Path, rel: &str) -> CoreResult<PathBuf> {
    let rel = sanitize_rel(rel)?;
    Ok(rel.split('/').fold(base.to_path_buf(), |acc, seg| acc.join(seg)))
}

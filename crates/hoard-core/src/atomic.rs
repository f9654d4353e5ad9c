use std::{io::Write, path::Path};

use crate::error::{CoreError, CoreResult};

/// Crash-safe whole-file write.
///
/// Data goes to a uniquely named temp file next to `path` and is renamed over
/// the target, so readers see either the old contents or the new ones, never a
/// partial write. Missing parent directories are created.
pub fn write_atomic(path: &Path, data: &[u8]) -> CoreResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CoreError::AtomicWrite(format!("no parent dir for {}", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| CoreError::AtomicWrite(format!("rename to {}: {e}", path.display())))?;

    tracing::trace!(path = %path.display(), bytes = data.len(), "atomic write");
    Ok(())
}

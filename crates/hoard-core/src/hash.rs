use std::{fs::File, io, path::Path};

use sha2::{Digest, Sha256};

use crate::error::CoreResult;

/// Lowercase hex SHA-256 of a byte buffer.
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Lowercase hex SHA-256 of a UTF-8 string.
#[must_use]
pub fn hash_str(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// Lowercase hex SHA-256 of a file's contents, streamed from disk.
///
/// # Errors
///
/// Returns [`crate::CoreError::Io`] if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> CoreResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

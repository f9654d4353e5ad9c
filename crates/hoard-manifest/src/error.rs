use std::path::PathBuf;

use hoard_core::CoreError;
use hoard_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt manifest file {file}: {reason}")]
    Corrupt { file: String, reason: String },

    #[error("manifest decryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("manifest file not found: {}", .0.display())]
    NotFound(PathBuf),
}

pub type ManifestResult<T> = Result<T, ManifestError>;

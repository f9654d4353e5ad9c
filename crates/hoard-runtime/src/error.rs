use hoard_download::DownloadError;
use hoard_manifest::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HoardError {
    #[error("{0} not found in any manifest")]
    NotFound(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<hoard_core::CoreError> for HoardError {
    fn from(e: hoard_core::CoreError) -> Self {
        match e {
            hoard_core::CoreError::Io(io) => Self::Io(io),
            other => Self::Config(other.to_string()),
        }
    }
}

pub type HoardResult<T> = Result<T, HoardError>;

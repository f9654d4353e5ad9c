use hoard_core::CoreError;
use hoard_net::NetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Net(#[from] NetError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("download cancelled")]
    Cancelled,
}

impl From<CoreError> for DownloadError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Io(io) => Self::Io(io),
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;

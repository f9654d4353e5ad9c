use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid relative path: {0:?}")]
    InvalidPath(String),

    #[error("atomic write failed: {0}")]
    AtomicWrite(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

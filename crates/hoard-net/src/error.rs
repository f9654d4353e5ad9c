use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("resume refused: {0}")]
    InvalidRange(String),
    #[error("timed out")]
    Timeout,
    #[error("gave up after {max_retries} retries: {source}")]
    RetryExhausted {
        max_retries: u32,
        source: Box<NetError>,
    },
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("http client: {0}")]
    Client(String),
}

impl NetError {
    pub fn http_status(status: u16, url: String) -> Self {
        Self::HttpStatus { status, url }
    }

    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Server-side hiccups, throttling and dropped connections.
    ///
    /// Missing files and refused ranges are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::HttpStatus { status, .. } => matches!(status, 408 | 429 | 500..=599),
            Self::Http(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("connection") || msg.contains("timed out")
            }
            Self::RetryExhausted { .. } | Self::InvalidRange(_) | Self::Client(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetryExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Http(format!("connection failed: {error}"))
        } else {
            Self::Http(error.to_string())
        }
    }
}

pub type NetResult<T> = Result<T, NetError>;

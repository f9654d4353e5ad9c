use std::path::PathBuf;

use url::Url;

/// One file to fetch. Identity is the destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
    pub url: Url,
    pub dest: PathBuf,
    /// Expected size in bytes, 0 when unknown.
    pub size: u64,
    /// Expected content hash, empty when unknown.
    pub hash: String,
    /// Whether a partial destination file may be resumed. Raw files are
    /// saved under plain names and always restart.
    pub resumable: bool,
}

impl DownloadInfo {
    #[must_use]
    pub fn new(url: Url, dest: impl Into<PathBuf>, size: u64, hash: impl Into<String>) -> Self {
        Self {
            url,
            dest: dest.into(),
            size,
            hash: hash.into(),
            resumable: true,
        }
    }

    #[must_use]
    pub fn with_resumable(mut self, resumable: bool) -> Self {
        self.resumable = resumable;
        self
    }
}

use std::path::PathBuf;

/// Events emitted by the download manager.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// Transfer started. `resumed_from` is the length already on disk.
    Started {
        dest: PathBuf,
        resumed_from: u64,
        total: u64,
    },
    /// Bytes written to the destination during this transfer.
    Progress {
        dest: PathBuf,
        downloaded: u64,
        total: u64,
    },
    /// Transfer finished and the file passed validation.
    Completed { dest: PathBuf, bytes: u64 },
    /// Transfer failed or the file failed validation.
    Failed { dest: PathBuf, error: String },
}

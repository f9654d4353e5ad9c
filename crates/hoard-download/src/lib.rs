#![forbid(unsafe_code)]

//! Download manager.
//!
//! Transfers run on a tokio runtime; their outcome is observed by polling a
//! [`Download`] handle or by the manager's per-tick [`DownloadManager::update`],
//! which fires completion callbacks on the caller's thread.

mod download;
mod error;
mod info;
mod manager;
mod transfer;

pub use download::{Download, DownloadStatus};
pub use error::{DownloadError, DownloadResult};
pub use info::DownloadInfo;
pub use manager::{DownloadManager, DownloadOptions};

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use hoard_core::Completion;
use parking_lot::{Condvar, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::DownloadInfo;

/// Transfer state of a [`Download`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    #[default]
    Queued,
    Downloading,
    Successful,
    Failed,
}

impl DownloadStatus {
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

#[derive(Debug, Default)]
struct State {
    error: Option<String>,
    resumed_from: u64,
    total: u64,
}

struct Shared {
    info: DownloadInfo,
    state: Mutex<State>,
    done: Condvar,
    status: watch::Sender<DownloadStatus>,
    downloaded: AtomicU64,
    cancel: CancellationToken,
    completion: Completion<Result<(), String>>,
}

/// Shared handle to one transfer.
///
/// Clones observe the same transfer. Byte counters cover the current
/// session only: bytes already on disk when a transfer resumes are reported
/// through [`Download::resumed_from`] and excluded from [`Download::total_bytes`].
#[derive(Clone)]
pub struct Download {
    shared: Arc<Shared>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("dest", &self.shared.info.dest)
            .field("status", &self.status())
            .field("downloaded", &self.downloaded_bytes())
            .field("total", &self.total_bytes())
            .finish()
    }
}

impl Download {
    pub(crate) fn new(info: DownloadInfo, cancel: CancellationToken) -> Self {
        let (status, _) = watch::channel(DownloadStatus::Queued);
        let total = info.size;
        Self {
            shared: Arc::new(Shared {
                info,
                state: Mutex::new(State {
                    total,
                    ..State::default()
                }),
                done: Condvar::new(),
                status,
                downloaded: AtomicU64::new(0),
                cancel,
                completion: Completion::new(),
            }),
        }
    }

    #[must_use]
    pub fn info(&self) -> &DownloadInfo {
        &self.shared.info
    }

    #[must_use]
    pub fn status(&self) -> DownloadStatus {
        *self.shared.status.borrow()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    /// Bytes written during this transfer.
    #[must_use]
    pub fn downloaded_bytes(&self) -> u64 {
        self.shared.downloaded.load(Ordering::Acquire)
    }

    /// Bytes this transfer has to fetch: expected size minus bytes already
    /// present when it resumed.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.shared.state.lock().total
    }

    /// Length of the partial file the transfer resumed from.
    #[must_use]
    pub fn resumed_from(&self) -> u64 {
        self.shared.state.lock().resumed_from
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.status() == DownloadStatus::Successful {
            return 1.0;
        }
        let total = self.total_bytes();
        if total == 0 {
            return 0.0;
        }
        (self.downloaded_bytes() as f64 / total as f64).min(1.0) as f32
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.shared.state.lock().error.clone()
    }

    /// Request cancellation. The partial file is kept for a later resume.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Register a continuation, fired from [`crate::DownloadManager::update`]
    /// once the transfer is terminal.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&Result<(), String>) + Send + 'static,
    {
        self.shared.completion.on_complete(f);
    }

    /// Block the calling thread until the transfer is terminal.
    pub fn wait(&self) -> Result<(), String> {
        let mut state = self.shared.state.lock();
        while !self.is_done() {
            self.shared.done.wait(&mut state);
        }
        Self::outcome(self.status(), &state)
    }

    /// Suspend until the transfer is terminal.
    pub async fn wait_async(&self) -> Result<(), String> {
        let mut rx = self.shared.status.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| s.is_done()).await;
        Self::outcome(self.status(), &self.shared.state.lock())
    }

    /// Same transfer, compared by identity.
    #[must_use]
    pub fn same_as(&self, other: &Download) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn outcome(status: DownloadStatus, state: &State) -> Result<(), String> {
        match status {
            DownloadStatus::Successful => Ok(()),
            _ => Err(state
                .error
                .clone()
                .unwrap_or_else(|| "download failed".to_string())),
        }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    pub(crate) fn begin(&self, resumed_from: u64) {
        {
            let mut state = self.shared.state.lock();
            state.resumed_from = resumed_from;
            state.total = self.shared.info.size.saturating_sub(resumed_from);
        }
        self.shared.downloaded.store(0, Ordering::Release);
        self.shared.status.send_replace(DownloadStatus::Downloading);
    }

    pub(crate) fn add_downloaded(&self, bytes: u64) -> u64 {
        self.shared.downloaded.fetch_add(bytes, Ordering::AcqRel) + bytes
    }

    pub(crate) fn finish(&self, result: Result<(), String>) {
        let mut state = self.shared.state.lock();
        let status = match result {
            Ok(()) => DownloadStatus::Successful,
            Err(error) => {
                state.error = Some(error);
                DownloadStatus::Failed
            }
        };
        self.shared.status.send_replace(status);
        self.shared.done.notify_all();
    }

    /// Fire completion callbacks. Returns `false` if they already ran.
    pub(crate) fn fire_completion(&self) -> bool {
        let outcome = Self::outcome(self.status(), &self.shared.state.lock());
        self.shared.completion.complete(outcome)
    }
}

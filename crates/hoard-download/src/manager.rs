use std::{
    collections::{HashMap, VecDeque},
    fmt,
    path::PathBuf,
    sync::Arc,
};

use hoard_core::Budget;
use hoard_events::EventBus;
use hoard_net::Net;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{Download, DownloadInfo, transfer};

#[derive(Clone, Debug)]
pub struct DownloadOptions {
    /// Transfers running at the same time.
    pub max_concurrent: usize,
    /// Bytes between two progress events of one transfer.
    pub progress_interval: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            progress_interval: 256 * 1024,
        }
    }
}

impl DownloadOptions {
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, bytes: u64) -> Self {
        self.progress_interval = bytes.max(1);
        self
    }
}

#[derive(Default)]
struct Queues {
    pending: VecDeque<Download>,
    active: Vec<Download>,
    by_dest: HashMap<PathBuf, Download>,
}

/// Queue of transfers deduplicated by destination.
///
/// Transfers start on [`DownloadManager::update`] as slots free up, or at
/// once through [`DownloadManager::wait_blocking`].
pub struct DownloadManager {
    net: Arc<dyn Net>,
    runtime: Handle,
    options: DownloadOptions,
    events: EventBus,
    cancel: CancellationToken,
    queues: Mutex<Queues>,
}

impl fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.queues.lock();
        f.debug_struct("DownloadManager")
            .field("pending", &queues.pending.len())
            .field("active", &queues.active.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    pub fn new(
        net: Arc<dyn Net>,
        runtime: Handle,
        options: DownloadOptions,
        events: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            net,
            runtime,
            options,
            events,
            cancel,
            queues: Mutex::new(Queues::default()),
        }
    }

    /// Queue a transfer. A destination already queued or in flight returns
    /// the existing handle; a finished one is replaced by a fresh transfer.
    pub fn download(&self, info: DownloadInfo) -> Download {
        let mut queues = self.queues.lock();
        if let Some(existing) = queues.by_dest.get(&info.dest).filter(|d| !d.is_done()) {
            trace!(dest = %info.dest.display(), "download deduplicated");
            return existing.clone();
        }
        debug!(url = %info.url, dest = %info.dest.display(), size = info.size, "download queued");
        let download = Download::new(info, self.cancel.child_token());
        queues
            .by_dest
            .insert(download.info().dest.clone(), download.clone());
        queues.pending.push_back(download.clone());
        download
    }

    /// Reap finished transfers, fire their completions and start queued ones.
    pub fn update(&self, budget: &Budget) {
        let mut finished = Vec::new();
        let mut to_start = Vec::new();
        {
            let mut queues = self.queues.lock();
            let Queues {
                pending,
                active,
                by_dest,
            } = &mut *queues;

            active.retain(|d| {
                if d.is_done() {
                    finished.push(d.clone());
                    false
                } else {
                    true
                }
            });

            pending.retain(|d| {
                if d.is_cancelled() {
                    d.finish(Err(crate::DownloadError::Cancelled.to_string()));
                    finished.push(d.clone());
                    false
                } else {
                    true
                }
            });

            for d in &finished {
                if by_dest.get(&d.info().dest).is_some_and(|cur| cur.same_as(d)) {
                    by_dest.remove(&d.info().dest);
                }
            }

            while active.len() < self.options.max_concurrent && !budget.is_busy() {
                let Some(next) = pending.pop_front() else {
                    break;
                };
                active.push(next.clone());
                to_start.push(next);
            }
        }

        for download in to_start {
            self.spawn(download);
        }
        for download in finished {
            download.fire_completion();
        }
    }

    /// Start `download` now if it is still queued, then block until it is
    /// terminal.
    pub fn wait_blocking(&self, download: &Download) -> Result<(), String> {
        self.start_now(download);
        download.wait()
    }

    /// Start `download` now if it is still queued, then suspend until it is
    /// terminal.
    pub async fn wait(&self, download: &Download) -> Result<(), String> {
        self.start_now(download);
        download.wait_async().await
    }

    fn start_now(&self, download: &Download) {
        let promoted = {
            let mut queues = self.queues.lock();
            let position = queues.pending.iter().position(|d| d.same_as(download));
            match position.and_then(|i| queues.pending.remove(i)) {
                Some(d) => {
                    queues.active.push(d.clone());
                    Some(d)
                }
                None => None,
            }
        };
        if let Some(d) = promoted {
            self.spawn(d);
        }
    }

    fn spawn(&self, download: Download) {
        trace!(dest = %download.info().dest.display(), "download started");
        self.runtime.spawn(transfer::run(
            Arc::clone(&self.net),
            download,
            self.events.clone(),
            self.options.progress_interval,
        ));
    }

    /// Cancel every queued and running transfer.
    pub fn cancel_all(&self) {
        let queues = self.queues.lock();
        for d in queues.pending.iter().chain(queues.active.iter()) {
            d.cancel();
        }
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queues.lock().pending.len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.queues.lock().active.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        let queues = self.queues.lock();
        queues.pending.is_empty() && queues.active.is_empty()
    }

    #[must_use]
    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }
}

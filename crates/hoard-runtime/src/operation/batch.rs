//! Batches of downloads reported as one operation.

use std::{
    path::PathBuf,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use hoard_core::{Budget, Completion, OperationStatus};
use hoard_download::{Download, DownloadInfo};
use hoard_events::OperationEvent;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::Drive;
use crate::{context::Context, hoard::Inner};

const NAME: &str = "download_batch";

type ProgressCallback = Arc<dyn Fn(&BatchReport) + Send + Sync>;

/// Aggregate state of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport {
    pub status: OperationStatus,
    /// Sum of declared sizes.
    pub total_size: u64,
    /// Bytes present on disk across all files, resumed bytes included.
    pub downloaded_bytes: u64,
    pub progress: f32,
    pub succeeded: usize,
    /// Destination and reason of every failed file.
    pub failed: Vec<(PathBuf, String)>,
    pub error: Option<String>,
}

impl BatchReport {
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == OperationStatus::Successful
    }
}

struct Item {
    info: DownloadInfo,
    download: Option<Download>,
    bytes: u64,
    outcome: Option<Result<(), String>>,
}

struct State {
    status: OperationStatus,
    items: Vec<Item>,
    error: Option<String>,
}

impl State {
    fn report(&self) -> BatchReport {
        let total_size: u64 = self.items.iter().map(|i| i.info.size).sum();
        let downloaded_bytes: u64 = self.items.iter().map(|i| i.bytes).sum();
        let progress = if total_size == 0 {
            if self.status.is_done() { 1.0 } else { 0.0 }
        } else {
            (downloaded_bytes as f64 / total_size as f64).min(1.0) as f32
        };
        BatchReport {
            status: self.status,
            total_size,
            downloaded_bytes,
            progress,
            succeeded: self
                .items
                .iter()
                .filter(|i| matches!(i.outcome, Some(Ok(()))))
                .count(),
            failed: self
                .items
                .iter()
                .filter_map(|i| match &i.outcome {
                    Some(Err(e)) => Some((i.info.dest.clone(), e.clone())),
                    _ => None,
                })
                .collect(),
            error: self.error.clone(),
        }
    }
}

struct Shared {
    state: Mutex<State>,
    cancelled: AtomicBool,
    completion: Mutex<Arc<Completion<BatchReport>>>,
    on_progress: Mutex<Vec<ProgressCallback>>,
}

/// Handle to a batch of downloads.
///
/// The batch fails only once every file is terminal, with one message
/// summarising the failures. [`DownloadBatch::retry`] re-queues the failed
/// files; finished ones are left alone and their bytes stay counted.
#[derive(Clone)]
pub struct DownloadBatch {
    shared: Arc<Shared>,
    scheduler: Weak<Inner>,
}

impl std::fmt::Debug for DownloadBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("DownloadBatch")
            .field("status", &state.status)
            .field("files", &state.items.len())
            .finish_non_exhaustive()
    }
}

impl DownloadBatch {
    pub(crate) fn new(infos: Vec<DownloadInfo>, scheduler: Weak<Inner>) -> (Self, BatchDriver) {
        let items = infos
            .into_iter()
            .map(|info| Item {
                info,
                download: None,
                bytes: 0,
                outcome: None,
            })
            .collect();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                status: OperationStatus::Init,
                items,
                error: None,
            }),
            cancelled: AtomicBool::new(false),
            completion: Mutex::new(Arc::new(Completion::new())),
            on_progress: Mutex::new(Vec::new()),
        });
        let driver = BatchDriver {
            shared: Arc::clone(&shared),
        };
        (Self { shared, scheduler }, driver)
    }

    #[must_use]
    pub fn report(&self) -> BatchReport {
        self.shared.state.lock().report()
    }

    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.shared.state.lock().status
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.shared.state.lock().error.clone()
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        self.report().progress
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.shared.state.lock().items.iter().map(|i| i.info.size).sum()
    }

    #[must_use]
    pub fn downloaded_bytes(&self) -> u64 {
        self.shared.state.lock().items.iter().map(|i| i.bytes).sum()
    }

    /// Called on every tick the batch is polled.
    pub fn on_progress<F>(&self, f: F)
    where
        F: Fn(&BatchReport) + Send + Sync + 'static,
    {
        self.shared.on_progress.lock().push(Arc::new(f));
    }

    /// Register a callback for the current attempt. After a retry, callbacks
    /// registered earlier have already fired.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&BatchReport) + Send + 'static,
    {
        let completion = Arc::clone(&self.shared.completion.lock());
        completion.on_complete(f);
    }

    /// Suspend until the current attempt finishes. Something must keep ticking.
    pub async fn wait(&self) -> BatchReport {
        let completion = Arc::clone(&self.shared.completion.lock());
        completion.wait().await
    }

    /// Stop every file still in flight. The batch fails with
    /// `download_batch cancelled` on its next poll; files that already
    /// finished keep their outcome.
    pub fn cancel(&self) {
        let state = self.shared.state.lock();
        if state.status.is_done() {
            return;
        }
        self.shared.cancelled.store(true, Ordering::Release);
        for item in &state.items {
            if let Some(download) = &item.download {
                download.cancel();
            }
        }
    }

    /// Re-queue failed files. Returns `false` unless the batch had failed and
    /// the runtime is still alive.
    pub fn retry(&self) -> bool {
        let Some(inner) = self.scheduler.upgrade() else {
            return false;
        };
        {
            let mut state = self.shared.state.lock();
            if state.status != OperationStatus::Failed {
                return false;
            }
            for item in &mut state.items {
                if !matches!(item.outcome, Some(Ok(()))) {
                    item.outcome = None;
                    item.download = None;
                }
            }
            self.shared.cancelled.store(false, Ordering::Release);
            state.status = OperationStatus::Processing;
            state.error = None;
        }
        *self.shared.completion.lock() = Arc::new(Completion::new());
        info!(batch = NAME, "retrying failed downloads");
        inner.enqueue(Box::new(BatchDriver {
            shared: Arc::clone(&self.shared),
        }));
        true
    }
}

/// Scheduler side of a [`DownloadBatch`].
pub(crate) struct BatchDriver {
    shared: Arc<Shared>,
}

impl Drive for BatchDriver {
    fn drive(&mut self, ctx: &Context, _budget: &Budget) -> bool {
        if self.shared.cancelled.load(Ordering::Acquire) {
            self.abort(ctx);
            return true;
        }
        let (report, done) = {
            let mut state = self.shared.state.lock();
            state.status = OperationStatus::Processing;
            for item in state.items.iter_mut().filter(|i| i.outcome.is_none()) {
                let download = item
                    .download
                    .get_or_insert_with(|| ctx.downloads.download(item.info.clone()));
                item.bytes = download.resumed_from() + download.downloaded_bytes();
                if download.is_done() {
                    let outcome = download.wait();
                    if outcome.is_ok() {
                        item.bytes = item.bytes.max(item.info.size);
                    }
                    item.outcome = Some(outcome);
                }
            }

            let done = state.items.iter().all(|i| i.outcome.is_some());
            if done {
                let failures: Vec<&String> = state
                    .items
                    .iter()
                    .filter_map(|i| i.outcome.as_ref().and_then(|o| o.as_ref().err()))
                    .collect();
                match failures.first() {
                    Some(first) => {
                        let error = format!("{} files failed, first reason: {first}", failures.len());
                        state.error = Some(error);
                        state.status = OperationStatus::Failed;
                    }
                    None => state.status = OperationStatus::Successful,
                }
            }
            (state.report(), done)
        };

        let callbacks = self.shared.on_progress.lock().clone();
        for callback in callbacks {
            callback(&report);
        }

        if done {
            match &report.error {
                Some(error) => warn!(batch = NAME, %error, "download batch failed"),
                None => info!(
                    batch = NAME,
                    files = report.succeeded,
                    bytes = report.downloaded_bytes,
                    "download batch finished"
                ),
            }
            ctx.events.publish(OperationEvent::Finished {
                name: NAME,
                error: report.error,
            });
        }
        done
    }

    fn abort(&mut self, ctx: &Context) {
        let error = format!("{NAME} cancelled");
        {
            let mut state = self.shared.state.lock();
            for item in &state.items {
                if let Some(download) = &item.download {
                    download.cancel();
                }
            }
            state.status = OperationStatus::Failed;
            state.error = Some(error.clone());
        }
        warn!(batch = NAME, "download batch cancelled");
        ctx.events.publish(OperationEvent::Finished {
            name: NAME,
            error: Some(error),
        });
    }

    fn fire(&self) {
        let report = self.shared.state.lock().report();
        let completion = Arc::clone(&self.shared.completion.lock());
        completion.complete(report);
    }
}

//! One-shot operations advanced by the scheduler tick.
//!
//! An operation starts when it is submitted and is then polled once per
//! tick until it reports a result. Completion callbacks fire after the tick
//! has released the operation queue.

mod batch;
mod clear;
mod init;
mod size;
mod update;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use hoard_core::{Budget, Completion, OperationStatus};
use hoard_events::OperationEvent;
use parking_lot::Mutex;
use tracing::{debug, warn};

pub use self::{
    batch::{BatchReport, DownloadBatch},
    size::DownloadSize,
    update::ManifestUpdate,
};
pub(crate) use self::{
    clear::ClearHistory, init::InitManifests, size::GetDownloadSize,
    update::UpdateManifests,
};
use crate::context::Context;

/// Result of starting or polling an operation.
pub(crate) enum Progress<T> {
    Pending(f32),
    Done(Result<T, String>),
}

pub(crate) trait Operation: Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    const NAME: &'static str;

    fn start(&mut self, _ctx: &Context) -> Progress<Self::Output> {
        Progress::Pending(0.0)
    }

    fn update(&mut self, ctx: &Context, budget: &Budget) -> Progress<Self::Output>;
}

/// Type-erased operation as stored in the scheduler queue.
pub(crate) trait Drive: Send {
    /// Advance once. Returns `true` when finished.
    fn drive(&mut self, ctx: &Context, budget: &Budget) -> bool;

    /// Finish as cancelled without further polling.
    fn abort(&mut self, ctx: &Context);

    /// Run completion callbacks. Called without scheduler locks held.
    fn fire(&self);
}

/// Point-in-time view of an operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationSnapshot<T> {
    pub name: &'static str,
    pub status: OperationStatus,
    pub progress: f32,
    pub error: Option<String>,
    pub result: Option<T>,
}

impl<T> OperationSnapshot<T> {
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == OperationStatus::Successful
    }
}

struct Shared<T> {
    state: Mutex<OperationSnapshot<T>>,
    completion: Completion<OperationSnapshot<T>>,
    cancelled: AtomicBool,
}

/// Caller side of a submitted operation.
pub struct OperationHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for OperationHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for OperationHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("OperationHandle")
            .field("name", &state.name)
            .field("status", &state.status)
            .field("progress", &state.progress)
            .finish_non_exhaustive()
    }
}

impl<T> OperationHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.shared.state.lock().name
    }

    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.shared.state.lock().status
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        self.shared.state.lock().progress
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.shared.state.lock().error.clone()
    }

    /// Operation output, once successful.
    #[must_use]
    pub fn result(&self) -> Option<T> {
        self.shared.state.lock().result.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> OperationSnapshot<T> {
        self.shared.state.lock().clone()
    }

    /// Fail the operation on its next poll.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    /// Register a callback for the terminal snapshot. Runs immediately if
    /// the operation already finished.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&OperationSnapshot<T>) + Send + 'static,
    {
        self.shared.completion.on_complete(f);
    }

    /// Suspend until the operation finishes. Something must keep ticking.
    pub async fn wait(&self) -> OperationSnapshot<T> {
        self.shared.completion.wait().await
    }
}

pub(crate) struct Driver<O: Operation> {
    op: O,
    shared: Arc<Shared<O::Output>>,
    started: bool,
}

impl<O: Operation> Driver<O> {
    pub(crate) fn new(op: O) -> (Self, OperationHandle<O::Output>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(OperationSnapshot {
                name: O::NAME,
                status: OperationStatus::Init,
                progress: 0.0,
                error: None,
                result: None,
            }),
            completion: Completion::new(),
            cancelled: AtomicBool::new(false),
        });
        let handle = OperationHandle {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                op,
                shared,
                started: false,
            },
            handle,
        )
    }

    fn finish(&self, ctx: &Context, result: Result<O::Output, String>) {
        let error = {
            let mut state = self.shared.state.lock();
            state.progress = 1.0;
            match result {
                Ok(output) => {
                    state.status = OperationStatus::Successful;
                    state.result = Some(output);
                }
                Err(error) => {
                    state.status = OperationStatus::Failed;
                    state.error = Some(error);
                }
            }
            state.error.clone()
        };
        match &error {
            Some(error) => warn!(operation = O::NAME, %error, "operation failed"),
            None => debug!(operation = O::NAME, "operation finished"),
        }
        ctx.events.publish(OperationEvent::Finished {
            name: O::NAME,
            error,
        });
    }
}

impl<O: Operation> Drive for Driver<O> {
    fn drive(&mut self, ctx: &Context, budget: &Budget) -> bool {
        if self.shared.cancelled.load(Ordering::Acquire) {
            self.finish(ctx, Err(format!("{} cancelled", O::NAME)));
            return true;
        }

        let progress = if self.started {
            self.op.update(ctx, budget)
        } else {
            self.started = true;
            self.shared.state.lock().status = OperationStatus::Processing;
            self.op.start(ctx)
        };
        match progress {
            Progress::Pending(progress) => {
                self.shared.state.lock().progress = progress.clamp(0.0, 1.0);
                false
            }
            Progress::Done(result) => {
                self.finish(ctx, result);
                true
            }
        }
    }

    fn abort(&mut self, ctx: &Context) {
        self.finish(ctx, Err(format!("{} cancelled", O::NAME)));
    }

    fn fire(&self) {
        let snapshot = self.shared.state.lock().clone();
        self.shared.completion.complete(snapshot);
    }
}

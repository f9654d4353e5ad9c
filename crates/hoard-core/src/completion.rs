use std::fmt;

use parking_lot::Mutex;
use tokio::sync::watch;

type Callback<T> = Box<dyn FnOnce(&T) + Send + 'static>;

/// Single-shot completion signal with fan-out.
///
/// Continuations registered with [`Completion::on_complete`] run exactly once,
/// in registration order, when [`Completion::complete`] is called. A
/// continuation registered after completion runs immediately on the calling
/// thread. Async callers suspend on [`Completion::wait`].
///
/// Callbacks never run while the internal lock is held, so they may register
/// further continuations or complete other signals.
pub struct Completion<T> {
    callbacks: Mutex<Option<Vec<Callback<T>>>>,
    tx: watch::Sender<Option<T>>,
}

impl<T> Completion<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            callbacks: Mutex::new(Some(Vec::new())),
            tx,
        }
    }

    /// Register a continuation.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        {
            let mut guard = self.callbacks.lock();
            if let Some(pending) = guard.as_mut() {
                pending.push(Box::new(f));
                return;
            }
        }

        if let Some(value) = self.value() {
            f(&value);
        }
    }

    /// Signal completion. Returns `false` if already completed.
    pub fn complete(&self, value: T) -> bool {
        let pending = {
            let mut guard = self.callbacks.lock();
            let Some(pending) = guard.take() else {
                return false;
            };
            self.tx.send_replace(Some(value.clone()));
            pending
        };

        for callback in pending {
            callback(&value);
        }
        true
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.tx.borrow().is_some()
    }

    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Wait for completion. Resolves immediately if already completed.
    pub async fn wait(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(value) = rx.borrow_and_update().clone() {
                return value;
            }
            // The sender lives in `self`, so `changed` cannot observe a closed channel.
            let _ = rx.changed().await;
        }
    }
}

impl<T> Default for Completion<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("value", &*self.tx.borrow())
            .finish()
    }
}

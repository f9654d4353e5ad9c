use std::{any::Any, fmt, path::PathBuf, sync::Arc};

use bytes::Bytes;
use hoard_core::{Completion, LoadStatus};

use crate::{
    hoard::Inner,
    loadable::{LoadId, LoadSnapshot},
};

/// Counted reference to a loadable.
///
/// Cloning takes another reference, dropping gives one back. Once the last
/// handle is gone the loadable is unloaded by a later tick, unless it is
/// requested again first.
pub struct LoadHandle {
    inner: Arc<Inner>,
    id: LoadId,
    address: String,
    completion: Arc<Completion<LoadSnapshot>>,
}

impl LoadHandle {
    /// Wrap a reference the caller already took.
    pub(crate) fn adopt(inner: Arc<Inner>, id: LoadId) -> Self {
        let (address, completion) = {
            let state = inner.state.lock();
            match state.node(id) {
                Some(node) => (node.address.clone(), Arc::clone(&node.completion)),
                None => (String::new(), Arc::new(Completion::new())),
            }
        };
        Self {
            inner,
            id,
            address,
            completion,
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.inner.state.lock().status(self.id)
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        self.inner
            .state
            .lock()
            .node(self.id)
            .map_or(0.0, |n| n.progress)
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .node(self.id)
            .and_then(|n| n.error.clone())
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    #[must_use]
    pub fn snapshot(&self) -> LoadSnapshot {
        self.inner
            .state
            .lock()
            .snapshot(self.id)
            .unwrap_or_else(|| LoadSnapshot {
                address: self.address.clone(),
                status: LoadStatus::Unloaded,
                progress: 0.0,
                error: None,
            })
    }

    /// Decoded asset value, when the decoder produced a `T`.
    #[must_use]
    pub fn asset<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = self.inner.state.lock().asset_value(self.id)?;
        value.downcast::<T>().ok()
    }

    /// Package bytes for assets and scenes, file contents for raw files.
    #[must_use]
    pub fn bytes(&self) -> Option<Bytes> {
        self.inner.state.lock().bytes(self.id)
    }

    /// Local path of a loaded raw file.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.inner.state.lock().file_path(self.id)
    }

    /// Register a callback for the terminal snapshot. Runs at once if the
    /// loadable already finished.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&LoadSnapshot) + Send + 'static,
    {
        self.completion.on_complete(f);
    }

    /// Suspend until the loadable finishes. Something must keep ticking.
    pub async fn wait(&self) -> LoadSnapshot {
        self.completion.wait().await
    }

    /// Finish loading on the calling thread, blocking on transfers and reads.
    ///
    /// Scene activation blocks on [`SceneTransition::activated`], so hosts
    /// whose transitions only advance on this thread should tick instead.
    ///
    /// [`SceneTransition::activated`]: crate::SceneTransition::activated
    pub fn load_immediately(&self) -> LoadSnapshot {
        self.inner
            .with_state(|state, ctx| state.load_immediately(ctx, self.id));
        self.snapshot()
    }

    /// Give the reference back. Same as dropping the handle.
    pub fn release(self) {
        drop(self);
    }
}

impl Clone for LoadHandle {
    fn clone(&self) -> Self {
        self.inner.with_state(|state, _| state.acquire(self.id));
        Self {
            inner: Arc::clone(&self.inner),
            id: self.id,
            address: self.address.clone(),
            completion: Arc::clone(&self.completion),
        }
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.inner
            .with_state(|state, ctx| state.release(ctx, self.id));
    }
}

impl fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandle")
            .field("id", &self.id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

//! Extension points implemented by the host application.

use std::{any::Any, sync::Arc};

use bytes::Bytes;
pub use futures::future::BoxFuture;

/// Decoded asset value handed out through `LoadHandle::asset`.
pub type AssetValue = Arc<dyn Any + Send + Sync>;

/// Builds an asset from the bytes of the package that contains it.
pub trait AssetDecoder: Send + Sync {
    /// # Errors
    ///
    /// The returned message becomes the asset's load error.
    fn decode(&self, address: &str, package: &Bytes) -> Result<AssetValue, String>;
}

/// Hands out the package bytes unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesDecoder;

impl AssetDecoder for BytesDecoder {
    fn decode(&self, _address: &str, package: &Bytes) -> Result<AssetValue, String> {
        Ok(Arc::new(package.clone()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SceneMode {
    /// Replaces the active scene; additive scenes attach to it.
    #[default]
    Single,
    Additive,
}

/// Host-side scene activation, polled once per tick.
pub trait SceneTransition: Send {
    fn progress(&self) -> f32;
    fn is_done(&self) -> bool;

    /// Resolves once activation has finished. Awaited instead of polling
    /// when the scene is loaded immediately.
    fn activated(&self) -> BoxFuture<'static, ()>;
}

/// Activates and tears down scenes once their packages are loaded.
pub trait SceneHost: Send + Sync {
    /// Start an asynchronous activation.
    ///
    /// # Errors
    ///
    /// The returned message becomes the scene's load error.
    fn begin(&self, address: &str, mode: SceneMode) -> Result<Box<dyn SceneTransition>, String>;

    /// Activate synchronously.
    ///
    /// # Errors
    ///
    /// The returned message becomes the scene's load error.
    fn load(&self, address: &str, mode: SceneMode) -> Result<(), String>;

    /// Tear down an additive scene that loaded successfully.
    fn unload(&self, address: &str);
}

/// Scene host for hosts without scenes: activation completes at once.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSceneHost;

struct Ready;

impl SceneTransition for Ready {
    fn progress(&self) -> f32 {
        1.0
    }

    fn is_done(&self) -> bool {
        true
    }

    fn activated(&self) -> BoxFuture<'static, ()> {
        Box::pin(futures::future::ready(()))
    }
}

impl SceneHost for NoopSceneHost {
    fn begin(&self, _address: &str, _mode: SceneMode) -> Result<Box<dyn SceneTransition>, String> {
        Ok(Box::new(Ready))
    }

    fn load(&self, _address: &str, _mode: SceneMode) -> Result<(), String> {
        Ok(())
    }

    fn unload(&self, _address: &str) {}
}

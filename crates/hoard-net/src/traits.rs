use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    retry::RetryNet,
    timeout::TimeoutNet,
    types::RetryPolicy,
};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, NetError>> + Send>>;

/// Transport used for version files, manifests and package bodies.
#[async_trait]
pub trait Net: Send + Sync {
    /// Read a whole (small) body into memory.
    async fn fetch(&self, url: Url) -> NetResult<Bytes>;

    /// Open a body stream starting at byte `offset`.
    ///
    /// With a non-zero offset the server must answer with the tail only;
    /// anything else is [`NetError::InvalidRange`] so the caller can restart
    /// from zero.
    async fn open(&self, url: Url, offset: u64) -> NetResult<ByteStream>;
}

pub trait NetExt: Net + Sized {
    fn with_timeout(self, timeout: Duration) -> TimeoutNet<Self> {
        TimeoutNet::new(self, timeout)
    }

    fn with_retry(self, policy: RetryPolicy) -> RetryNet<Self> {
        RetryNet::new(self, policy)
    }
}

impl<T: Net> NetExt for T {}

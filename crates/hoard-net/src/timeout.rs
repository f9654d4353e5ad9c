use std::{future::Future, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::{
    ByteStream,
    error::{NetError, NetResult},
    traits::Net,
};

/// Bounds every call of the wrapped [`Net`] by a fixed duration.
///
/// For [`Net::open`] only the time to a response counts; reading the stream
/// afterwards is not limited.
pub struct TimeoutNet<N> {
    inner: N,
    limit: Duration,
}

impl<N: Net> TimeoutNet<N> {
    pub fn new(inner: N, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(&self, call: impl Future<Output = NetResult<T>>) -> NetResult<T> {
        tokio::time::timeout(self.limit, call)
            .await
            .unwrap_or(Err(NetError::Timeout))
    }
}

#[async_trait]
impl<N: Net> Net for TimeoutNet<N> {
    async fn fetch(&self, url: Url) -> NetResult<Bytes> {
        self.bounded(self.inner.fetch(url)).await
    }

    async fn open(&self, url: Url, offset: u64) -> NetResult<ByteStream> {
        self.bounded(self.inner.open(url, offset)).await
    }
}

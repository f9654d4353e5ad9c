use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::{
    ByteStream,
    error::{NetError, NetResult},
    traits::Net,
    types::RetryPolicy,
};

/// Repeats failed calls of the wrapped [`Net`] according to a [`RetryPolicy`].
///
/// Errors that are not transient come back untouched on the first failure.
/// Once the policy gives up the last error is wrapped in
/// [`NetError::RetryExhausted`].
pub struct RetryNet<N> {
    inner: N,
    policy: RetryPolicy,
}

impl<N: Net> RetryNet<N> {
    pub fn new(inner: N, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt<T, F, Fut>(&self, url: &Url, mut call: F) -> NetResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = NetResult<T>> + Send,
        T: Send,
    {
        let mut retries = 0;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => error,
            };
            if !self.policy.allows(&error, retries) {
                return Err(NetError::RetryExhausted {
                    max_retries: self.policy.max_retries,
                    source: Box::new(error),
                });
            }
            retries += 1;
            let delay = self.policy.backoff(retries);
            debug!(%url, retries, ?delay, %error, "transient failure, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl<N: Net> Net for RetryNet<N> {
    async fn fetch(&self, url: Url) -> NetResult<Bytes> {
        self.attempt(&url, || self.inner.fetch(url.clone())).await
    }

    async fn open(&self, url: Url, offset: u64) -> NetResult<ByteStream> {
        self.attempt(&url, || self.inner.open(url.clone(), offset))
            .await
    }
}

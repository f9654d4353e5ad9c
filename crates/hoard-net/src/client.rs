use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::{Client, Response, StatusCode, header};
use tracing::trace;
use url::Url;

use crate::{
    ByteStream,
    error::{NetError, NetResult},
    traits::Net,
    types::NetOptions,
};

/// `reqwest`-backed [`Net`].
///
/// Carries no retry or timeout policy of its own beyond connect and fetch
/// limits; wrap it with [`NetExt`](crate::NetExt) for that.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    options: NetOptions,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns [`NetError::Client`] if the TLS backend cannot be initialised.
    pub fn new(options: NetOptions) -> NetResult<Self> {
        let inner = Client::builder()
            .user_agent(options.user_agent.clone())
            .connect_timeout(options.connect_timeout)
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()
            .map_err(|e| NetError::Client(e.to_string()))?;
        Ok(Self { inner, options })
    }

    pub fn options(&self) -> &NetOptions {
        &self.options
    }
}

fn range_from(offset: u64) -> String {
    format!("bytes={offset}-")
}

fn body_stream(response: Response) -> ByteStream {
    Box::pin(response.bytes_stream().map_err(NetError::from))
}

/// Accept a response to a tail request only if it really is the tail.
fn check_partial(response: &Response, url: &Url, offset: u64) -> NetResult<()> {
    match response.status() {
        StatusCode::PARTIAL_CONTENT => Ok(()),
        StatusCode::RANGE_NOT_SATISFIABLE => Err(NetError::InvalidRange(format!(
            "offset {offset} is past the end of {url}"
        ))),
        status if status.is_success() => Err(NetError::InvalidRange(format!(
            "{url} answered {} to a request from offset {offset}",
            status.as_u16()
        ))),
        status => Err(NetError::http_status(status.as_u16(), url.to_string())),
    }
}

#[async_trait]
impl Net for HttpClient {
    async fn fetch(&self, url: Url) -> NetResult<Bytes> {
        let response = self
            .inner
            .get(url.clone())
            .timeout(self.options.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NetError::http_status(
                response.status().as_u16(),
                url.to_string(),
            ));
        }
        Ok(response.bytes().await?)
    }

    async fn open(&self, url: Url, offset: u64) -> NetResult<ByteStream> {
        // The body itself is unbounded in time; only sending is.
        let mut request = self.inner.get(url.clone());
        if offset > 0 {
            request = request.header(header::RANGE, range_from(offset));
        }
        let response = request.send().await?;

        if offset > 0 {
            check_partial(&response, &url, offset)?;
        } else if !response.status().is_success() {
            return Err(NetError::http_status(
                response.status().as_u16(),
                url.to_string(),
            ));
        }
        trace!(%url, offset, length = ?response.content_length(), "body opened");
        Ok(body_stream(response))
    }
}

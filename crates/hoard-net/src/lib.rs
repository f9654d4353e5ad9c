//! HTTP transport for hoard.
//!
//! [`HttpClient`] speaks to the content server; [`TimeoutNet`] and
//! [`RetryNet`] wrap any [`Net`] and are stacked through [`NetExt`].

#![forbid(unsafe_code)]

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use crate::{
    client::HttpClient,
    error::{NetError, NetResult},
    retry::RetryNet,
    timeout::TimeoutNet,
    traits::{ByteStream, Net, NetExt},
    types::{NetOptions, RetryPolicy},
};

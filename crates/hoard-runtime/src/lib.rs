#![forbid(unsafe_code)]

//! Client-side runtime for content-addressed asset packages.
//!
//! [`Hoard`] resolves asset paths through registered manifests, loads the
//! owning package and its dependencies from the built-in directory, the
//! download directory or the network, and keeps everything reference-counted
//! until the last [`LoadHandle`] is gone. Work advances only on
//! [`Hoard::tick`], under a per-tick busy budget.

mod config;
mod context;
mod error;
mod handle;
mod hoard;
mod host;
mod loadable;
mod operation;
mod paths;
mod settings;
mod source;

pub use crate::{
    config::HoardConfig,
    error::{HoardError, HoardResult},
    handle::LoadHandle,
    hoard::Hoard,
    host::{
        AssetDecoder, AssetValue, BoxFuture, BytesDecoder, NoopSceneHost, SceneHost, SceneMode,
        SceneTransition,
    },
    loadable::{CacheStats, LoadSnapshot},
    operation::{
        BatchReport, DownloadBatch, DownloadSize, ManifestUpdate, OperationHandle,
        OperationSnapshot,
    },
    paths::{AssetPaths, UrlResolver},
    settings::{Channel, Settings},
    source::{PackageSource, SourceInputs, select_source},
};

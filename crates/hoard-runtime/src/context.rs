//! Services shared by loadables and operations.

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use hoard_crypto::{CryptoContext, DecryptReader};
use hoard_download::{DownloadInfo, DownloadManager};
use hoard_events::EventBus;
use hoard_manifest::{ManifestCodec, ManifestRegistry, PackageInfo};
use hoard_net::Net;
use tokio::{
    runtime::{Builder, Handle, Runtime},
    sync::oneshot::{self, error::TryRecvError},
};
use tokio_util::sync::CancellationToken;
use tracing::trace;
use url::Url;

use crate::{AssetDecoder, AssetPaths, HoardResult, SceneHost, Settings};

/// How far a loadable may advance in one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Pace {
    /// Poll background work once.
    Tick,
    /// Block until the loadable is terminal.
    Immediate,
}

/// Receiver of a background task's result.
pub(crate) type Task<T> = oneshot::Receiver<HoardResult<T>>;

/// Runtime for transfers and blocking reads: borrowed or owned.
pub(crate) struct IoRuntime {
    handle: Handle,
    owned: Option<Runtime>,
}

impl IoRuntime {
    pub(crate) fn new(handle: Option<Handle>) -> HoardResult<Self> {
        if let Some(handle) = handle {
            return Ok(Self {
                handle,
                owned: None,
            });
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("hoard-io")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(runtime),
        })
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Drop for IoRuntime {
    fn drop(&mut self) {
        // Dropping a runtime from inside another runtime panics.
        if let Some(runtime) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}

pub(crate) struct Context {
    pub paths: AssetPaths,
    pub settings: Settings,
    pub crypto: CryptoContext,
    pub codec: ManifestCodec,
    pub registry: Arc<ManifestRegistry>,
    pub downloads: DownloadManager,
    pub net: Arc<dyn Net>,
    pub events: EventBus,
    pub decoder: Arc<dyn AssetDecoder>,
    pub scene_host: Arc<dyn SceneHost>,
    pub cancel: CancellationToken,
    pub busy_budget: Duration,
    // Last field: shut down after everything that spawns onto it.
    pub io: IoRuntime,
}

impl Context {
    /// Key material when packages are encrypted.
    pub(crate) fn package_crypto(&self, encrypted: bool) -> Option<CryptoContext> {
        encrypted.then(|| self.crypto.clone())
    }

    /// Present in the download dir with the expected size.
    pub(crate) fn is_resident(&self, info: &PackageInfo) -> bool {
        self.paths
            .download_path(&info.save_file_name())
            .ok()
            .and_then(|path| fs::metadata(path).ok())
            .is_some_and(|meta| meta.len() == info.size)
    }

    /// Transfer description for a package or raw file.
    pub(crate) fn download_info(&self, info: &PackageInfo) -> HoardResult<DownloadInfo> {
        Ok(DownloadInfo::new(
            self.paths.download_url(&info.name_with_hash())?,
            self.paths.download_path(&info.save_file_name())?,
            info.size,
            info.hash.clone(),
        )
        .with_resumable(!info.raw_file))
    }

    pub(crate) fn spawn_read(&self, path: PathBuf, crypto: Option<CryptoContext>) -> Task<Bytes> {
        let (tx, rx) = oneshot::channel();
        self.io.handle().spawn_blocking(move || {
            let _ = tx.send(read_file(&path, crypto.as_ref()));
        });
        rx
    }

    pub(crate) fn spawn_copy(&self, from: PathBuf, to: PathBuf) -> Task<()> {
        let (tx, rx) = oneshot::channel();
        self.io.handle().spawn_blocking(move || {
            let _ = tx.send(copy_file(&from, &to));
        });
        rx
    }

    pub(crate) fn spawn_fetch(&self, url: Url) -> Task<Bytes> {
        let (tx, rx) = oneshot::channel();
        let net = Arc::clone(&self.net);
        self.io.handle().spawn(async move {
            let result = net.fetch(url).await.map_err(|e| {
                crate::HoardError::Download(hoard_download::DownloadError::Net(e))
            });
            let _ = tx.send(result);
        });
        rx
    }
}

/// Poll a background task, or block on it for [`Pace::Immediate`].
pub(crate) fn poll_task<T>(task: &mut Task<T>, pace: Pace) -> Option<Result<T, String>> {
    let received = match pace {
        Pace::Immediate => futures::executor::block_on(task).ok(),
        Pace::Tick => match task.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => None,
        },
    };
    Some(match received {
        Some(result) => result.map_err(|e| e.to_string()),
        None => Err("background task dropped before finishing".to_string()),
    })
}

/// Read a whole file, decrypting when `crypto` is set.
pub(crate) fn read_file(path: &Path, crypto: Option<&CryptoContext>) -> HoardResult<Bytes> {
    let file = fs::File::open(path)?;
    let mut data = Vec::new();
    match crypto {
        Some(ctx) => DecryptReader::new(io::BufReader::new(file), ctx).read_to_end(&mut data)?,
        None => io::BufReader::new(file).read_to_end(&mut data)?,
    };
    trace!(path = %path.display(), bytes = data.len(), "file read");
    Ok(Bytes::from(data))
}

/// Copy through a temp file so readers never see a partial copy.
pub(crate) fn copy_file(from: &Path, to: &Path) -> HoardResult<()> {
    let data = fs::read(from)?;
    hoard_core::write_atomic(to, &data)?;
    trace!(from = %from.display(), to = %to.display(), bytes = data.len(), "file copied");
    Ok(())
}

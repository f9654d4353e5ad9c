//! One file transfer: resume decision, streaming to disk, validation.

use std::{io, path::Path, sync::Arc};

use futures::StreamExt;
use hoard_events::{DownloadEvent, EventBus};
use hoard_net::{ByteStream, Net, NetError};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, trace, warn};

use crate::{Download, DownloadError, DownloadInfo, DownloadResult};

/// Run `download` to completion and record the outcome on the handle.
pub(crate) async fn run(
    net: Arc<dyn Net>,
    download: Download,
    events: EventBus,
    progress_interval: u64,
) {
    let dest = download.info().dest.clone();
    let result = transfer(net.as_ref(), &download, &events, progress_interval).await;
    match &result {
        Ok(bytes) => {
            info!(dest = %dest.display(), bytes, "download complete");
            events.publish(DownloadEvent::Completed {
                dest,
                bytes: *bytes,
            });
        }
        Err(e) => {
            warn!(dest = %dest.display(), error = %e, "download failed");
            events.publish(DownloadEvent::Failed {
                dest,
                error: e.to_string(),
            });
        }
    }
    download.finish(result.map(|_| ()).map_err(|e| e.to_string()));
}

async fn transfer(
    net: &dyn Net,
    download: &Download,
    events: &EventBus,
    progress_interval: u64,
) -> DownloadResult<u64> {
    let info = download.info();
    if let Some(parent) = info.dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut offset = resume_offset(info).await?;
    if offset == info.size && info.size > 0 {
        debug!(dest = %info.dest.display(), "already complete");
        download.begin(offset);
        return Ok(offset);
    }

    download.begin(offset);
    events.publish(DownloadEvent::Started {
        dest: info.dest.clone(),
        resumed_from: offset,
        total: info.size,
    });

    let stream = match net.open(info.url.clone(), offset).await {
        Ok(stream) => stream,
        Err(NetError::InvalidRange(reason)) if offset > 0 => {
            debug!(dest = %info.dest.display(), %reason, "range refused, restarting");
            offset = 0;
            download.begin(0);
            net.open(info.url.clone(), 0).await?
        }
        Err(e) => return Err(e.into()),
    };

    write_stream(stream, download, events, offset, progress_interval).await?;
    validate(info).await
}

/// Decide where a transfer starts from, removing unusable leftovers.
///
/// Returns `info.size` when the destination is already complete and valid.
async fn resume_offset(info: &DownloadInfo) -> DownloadResult<u64> {
    let len = match fs::metadata(&info.dest).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    if info.size > 0 && len == info.size && hash_matches(&info.dest, &info.hash).await? {
        return Ok(len);
    }
    if info.resumable && info.size > 0 && len < info.size {
        trace!(dest = %info.dest.display(), len, "resuming partial file");
        return Ok(len);
    }

    debug!(dest = %info.dest.display(), len, "discarding existing file");
    remove_if_exists(&info.dest).await?;
    Ok(0)
}

async fn write_stream(
    mut stream: ByteStream,
    download: &Download,
    events: &EventBus,
    offset: u64,
    progress_interval: u64,
) -> DownloadResult<()> {
    let info = download.info();
    let mut file = if offset > 0 {
        fs::OpenOptions::new().append(true).open(&info.dest).await?
    } else {
        fs::File::create(&info.dest).await?
    };

    let cancel = download.cancel_token().clone();
    let mut last_reported = 0u64;
    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => {
                file.flush().await?;
                return Err(DownloadError::Cancelled);
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let bytes = chunk?;
        file.write_all(&bytes).await?;

        let downloaded = download.add_downloaded(bytes.len() as u64);
        if downloaded - last_reported >= progress_interval {
            last_reported = downloaded;
            trace!(dest = %info.dest.display(), downloaded, "download progress");
            events.publish(DownloadEvent::Progress {
                dest: info.dest.clone(),
                downloaded,
                total: download.total_bytes(),
            });
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

/// Check size then hash; a mismatching file is deleted.
async fn validate(info: &DownloadInfo) -> DownloadResult<u64> {
    let actual = fs::metadata(&info.dest).await?.len();
    if info.size > 0 && actual != info.size {
        remove_if_exists(&info.dest).await?;
        return Err(DownloadError::SizeMismatch {
            expected: info.size,
            actual,
        });
    }
    if !info.hash.is_empty() {
        let hash = file_hash(&info.dest).await?;
        if hash != info.hash {
            remove_if_exists(&info.dest).await?;
            return Err(DownloadError::HashMismatch {
                expected: info.hash.clone(),
                actual: hash,
            });
        }
    }
    Ok(actual)
}

async fn hash_matches(path: &Path, expected: &str) -> DownloadResult<bool> {
    if expected.is_empty() {
        return Ok(true);
    }
    Ok(file_hash(path).await? == expected)
}

async fn file_hash(path: &Path) -> DownloadResult<String> {
    let path = path.to_path_buf();
    let hash = tokio::task::spawn_blocking(move || hoard_core::hash_file(&path))
        .await
        .map_err(io::Error::other)??;
    Ok(hash)
}

async fn remove_if_exists(path: &Path) -> DownloadResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

//! Package loadables, cached by `name_with_hash`.

use std::path::PathBuf;

use bytes::Bytes;
use hoard_core::LoadStatus;
use hoard_download::{Download, DownloadInfo};
use hoard_manifest::PackageInfo;
use tracing::{debug, trace};

use super::{Kind, LoadId, Node, State, Step};
use crate::{
    HoardResult, PackageSource, SourceInputs,
    context::{Context, Pace, Task, poll_task},
    select_source,
};

pub(crate) struct PackageNode {
    pub info: PackageInfo,
    phase: Phase,
    pub bytes: Option<Bytes>,
}

enum Phase {
    Idle,
    Downloading { download: Download, encrypted: bool },
    Unpacking { task: Task<()>, dest: PathBuf },
    Reading(Task<Bytes>),
    Fetching(Task<Bytes>),
}

/// Look up or create the package node, taking one reference.
pub(super) fn request(state: &mut State, ctx: &Context, info: PackageInfo) -> LoadId {
    let key = info.name_with_hash();
    if let Some(&id) = state.packages.get(&key) {
        state.acquire(id);
        return id;
    }

    if let Some(stale) = state.running.insert(info.name.clone(), key.clone()) {
        debug!(package = %info.name, %stale, current = %key, "package version superseded");
    }
    let id = state.insert(
        key.clone(),
        Kind::Package(PackageNode {
            info,
            phase: Phase::Idle,
            bytes: None,
        }),
    );
    state.packages.insert(key, id);
    state.acquire(id);
    state.start(ctx, id);
    id
}

fn source_for(state: &mut State, ctx: &Context, info: &PackageInfo) -> HoardResult<PackageSource> {
    let key = info.name_with_hash();
    if let Some(source) = state.sources.get(&key) {
        return Ok(source.clone());
    }

    let file = info.save_file_name();
    let local_path = ctx.paths.local_path(&file)?;
    let download_path = ctx.paths.download_path(&file)?;
    let url = ctx.paths.download_url(&key)?;
    let source = select_source(&SourceInputs {
        encrypted: ctx.settings.encrypted,
        resident: ctx.is_resident(info),
        offline: ctx.settings.offline,
        built_in: ctx.settings.is_built_in(&key),
        channel: ctx.settings.channel,
        local_path: &local_path,
        download_path: &download_path,
        url: &url,
    });
    if source.is_memoizable() {
        state.sources.insert(key, source.clone());
    }
    Ok(source)
}

pub(super) fn start(state: &mut State, ctx: &Context, id: LoadId) -> Step {
    let Some(info) = package(state, id).map(|p| p.info.clone()) else {
        return Some(Err(format!("loadable {id} is not a package")));
    };
    match begin(state, ctx, id, &info) {
        Ok(()) => None,
        Err(e) => Some(Err(e.to_string())),
    }
}

fn begin(state: &mut State, ctx: &Context, id: LoadId, info: &PackageInfo) -> HoardResult<()> {
    let source = source_for(state, ctx, info)?;
    trace!(package = %info.name, ?source, "package source selected");

    let crypto = ctx.package_crypto(ctx.settings.encrypted);
    let (status, phase) = match source {
        PackageSource::Local(path) => (LoadStatus::Loading, Phase::Reading(ctx.spawn_read(path, None))),
        PackageSource::Encrypted {
            path,
            needs_unpack: false,
        } => (LoadStatus::Loading, Phase::Reading(ctx.spawn_read(path, crypto))),
        PackageSource::Encrypted {
            path,
            needs_unpack: true,
        } => {
            let dest = ctx.paths.download_path(&info.save_file_name())?;
            let task = ctx.spawn_copy(path, dest.clone());
            (LoadStatus::Unpacking, Phase::Unpacking { task, dest })
        }
        PackageSource::Remote {
            url,
            dest,
            encrypted,
        } => {
            let download =
                ctx.downloads
                    .download(DownloadInfo::new(url, dest, info.size, info.hash.clone()));
            (
                LoadStatus::CheckingVersion,
                Phase::Downloading {
                    download,
                    encrypted,
                },
            )
        }
        PackageSource::Streamed(url) => (LoadStatus::Loading, Phase::Fetching(ctx.spawn_fetch(url))),
    };

    if let Some(node) = state.node_mut(id) {
        node.status = status;
        if let Kind::Package(package) = &mut node.kind {
            package.phase = phase;
        }
    }
    Ok(())
}

pub(super) fn update(state: &mut State, ctx: &Context, id: LoadId, pace: Pace) -> Step {
    let Some(Node {
        status,
        progress,
        kind: Kind::Package(package),
        ..
    }) = state.node_mut(id)
    else {
        return Some(Err(format!("loadable {id} is not a package")));
    };

    match &mut package.phase {
        Phase::Idle => Some(Err(format!("package {} was never started", package.info.name))),
        Phase::Downloading {
            download,
            encrypted,
        } => {
            let outcome = match pace {
                Pace::Immediate => ctx.downloads.wait_blocking(download),
                Pace::Tick if download.is_done() => download.wait(),
                Pace::Tick => {
                    *progress = download.progress();
                    return None;
                }
            };
            if let Err(e) = outcome {
                return Some(Err(format!("package {} download failed: {e}", package.info.name)));
            }
            let path = download.info().dest.clone();
            let crypto = ctx.package_crypto(*encrypted);
            package.phase = Phase::Reading(ctx.spawn_read(path, crypto));
            *status = LoadStatus::Loading;
            None
        }
        Phase::Unpacking { task, dest } => match poll_task(task, pace)? {
            Ok(()) => {
                let path = dest.clone();
                package.phase = Phase::Reading(ctx.spawn_read(path, Some(ctx.crypto.clone())));
                *status = LoadStatus::Loading;
                None
            }
            Err(e) => Some(Err(format!("package {} unpack failed: {e}", package.info.name))),
        },
        Phase::Reading(task) | Phase::Fetching(task) => match poll_task(task, pace)? {
            Ok(bytes) if bytes.is_empty() => Some(Err(format!(
                "package {} resolved to an empty handle",
                package.info.name
            ))),
            Ok(bytes) => {
                package.bytes = Some(bytes);
                Some(Ok(()))
            }
            Err(e) => Some(Err(format!("package {} read failed: {e}", package.info.name))),
        },
    }
}

pub(super) fn unloaded(state: &mut State, id: LoadId, key: &str, package: PackageNode) {
    if state.packages.get(key) == Some(&id) {
        state.packages.remove(key);
    }
    if state.running.get(&package.info.name).map(String::as_str) == Some(key) {
        state.running.remove(&package.info.name);
    }
}

fn package(state: &State, id: LoadId) -> Option<&PackageNode> {
    match &state.node(id)?.kind {
        Kind::Package(package) => Some(package),
        _ => None,
    }
}

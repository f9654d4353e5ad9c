//! Raw file loadables. Not cached: each request loads its own copy.

use std::path::PathBuf;

use bytes::Bytes;
use hoard_core::LoadStatus;
use hoard_download::Download;

use super::{Kind, LoadId, Node, State, Step};
use crate::{
    HoardError, HoardResult,
    context::{Context, Pace, Task, poll_task},
};

pub(crate) struct RawFileNode {
    path: String,
    pub(super) file: Option<PathBuf>,
    pub(super) bytes: Option<Bytes>,
    phase: Phase,
}

enum Phase {
    Idle,
    Downloading(Download),
    Reading(Task<Bytes>),
}

pub(crate) fn request_raw_file(state: &mut State, ctx: &Context, address: &str) -> LoadId {
    let path = ctx.registry.resolve_address(address);
    let id = state.insert(
        address.to_string(),
        Kind::RawFile(RawFileNode {
            path,
            file: None,
            bytes: None,
            phase: Phase::Idle,
        }),
    );
    state.acquire(id);
    state.start(ctx, id);
    id
}

pub(super) fn start(state: &mut State, ctx: &Context, id: LoadId) -> Step {
    match begin(state, ctx, id) {
        Ok(()) => None,
        Err(e) => Some(Err(e.to_string())),
    }
}

fn begin(state: &mut State, ctx: &Context, id: LoadId) -> HoardResult<()> {
    let Some(Node {
        status,
        kind: Kind::RawFile(raw),
        ..
    }) = state.node_mut(id)
    else {
        return Err(HoardError::NotFound(format!("raw file {id}")));
    };
    let info = ctx
        .registry
        .package_for_asset(&raw.path)
        .ok_or_else(|| HoardError::NotFound(raw.path.clone()))?;

    let name = info.save_file_name();
    let local_first = ctx.settings.offline || ctx.settings.is_built_in(&info.name_with_hash());
    let file = if local_first {
        ctx.paths.local_path(&name)?
    } else if ctx.is_resident(&info) {
        ctx.paths.download_path(&name)?
    } else {
        let download = ctx.downloads.download(ctx.download_info(&info)?);
        raw.phase = Phase::Downloading(download);
        *status = LoadStatus::CheckingVersion;
        return Ok(());
    };

    raw.phase = Phase::Reading(ctx.spawn_read(file.clone(), None));
    raw.file = Some(file);
    *status = LoadStatus::Loading;
    Ok(())
}

pub(super) fn update(state: &mut State, ctx: &Context, id: LoadId, pace: Pace) -> Step {
    let Some(Node {
        address,
        status,
        progress,
        kind: Kind::RawFile(raw),
        ..
    }) = state.node_mut(id)
    else {
        return Some(Err(format!("loadable {id} is not a raw file")));
    };

    match &mut raw.phase {
        Phase::Idle => Some(Err(format!("raw file {address} was never started"))),
        Phase::Downloading(download) => {
            let outcome = match pace {
                Pace::Immediate => ctx.downloads.wait_blocking(download),
                Pace::Tick if download.is_done() => download.wait(),
                Pace::Tick => {
                    *progress = download.progress();
                    return None;
                }
            };
            if let Err(e) = outcome {
                return Some(Err(format!("raw file {address} download failed: {e}")));
            }
            let file = download.info().dest.clone();
            raw.phase = Phase::Reading(ctx.spawn_read(file.clone(), None));
            raw.file = Some(file);
            *status = LoadStatus::Loading;
            None
        }
        Phase::Reading(task) => match poll_task(task, pace)? {
            Ok(bytes) => {
                raw.bytes = Some(bytes);
                Some(Ok(()))
            }
            Err(e) => Some(Err(format!("raw file {address} read failed: {e}"))),
        },
    }
}

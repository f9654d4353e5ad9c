//! Asset loadables, cached by address.

use hoard_core::LoadStatus;

use super::{Kind, LoadId, Node, State, Step, dependency};
use crate::{
    AssetValue, HoardError,
    context::{Context, Pace},
};

pub(crate) struct AssetNode {
    path: String,
    pub(super) dependency: Option<LoadId>,
    pub(super) value: Option<AssetValue>,
}

/// Look up or create the asset for `address`, taking one reference.
pub(crate) fn request_asset(state: &mut State, ctx: &Context, address: &str) -> LoadId {
    if let Some(&id) = state.assets.get(address) {
        state.acquire(id);
        return id;
    }

    let path = ctx.registry.resolve_address(address);
    let id = state.insert(
        address.to_string(),
        Kind::Asset(AssetNode {
            path,
            dependency: None,
            value: None,
        }),
    );
    state.assets.insert(address.to_string(), id);
    state.acquire(id);
    state.start(ctx, id);
    id
}

pub(super) fn start(state: &mut State, ctx: &Context, id: LoadId) -> Step {
    let path = match state.node(id).map(|n| &n.kind) {
        Some(Kind::Asset(asset)) => asset.path.clone(),
        _ => return Some(Err(format!("loadable {id} is not an asset"))),
    };
    let Some(resolved) = ctx.registry.resolve(&path) else {
        return Some(Err(HoardError::NotFound(path).to_string()));
    };

    let dependency = dependency::request(state, ctx, resolved);
    if let Some(Node {
        status,
        kind: Kind::Asset(asset),
        ..
    }) = state.node_mut(id)
    {
        asset.dependency = Some(dependency);
        *status = LoadStatus::DependentLoading;
    }
    update(state, ctx, id, Pace::Tick)
}

pub(super) fn update(state: &mut State, ctx: &Context, id: LoadId, pace: Pace) -> Step {
    let (address, dependency) = match state.node(id) {
        Some(Node {
            address,
            kind: Kind::Asset(AssetNode {
                dependency: Some(dependency),
                ..
            }),
            ..
        }) => (address.clone(), *dependency),
        _ => return Some(Err(format!("asset {id} has no dependency"))),
    };

    if pace == Pace::Immediate {
        state.load_immediately(ctx, dependency);
    }
    let Some(node) = state.node(dependency) else {
        return Some(Err(format!("dependencies of {address} were unloaded")));
    };
    match node.status {
        LoadStatus::LoadSuccessful => {}
        LoadStatus::LoadFailed => return Some(Err(node.error.clone().unwrap_or_default())),
        _ => {
            let progress = node.progress;
            state.set_progress(id, progress);
            return None;
        }
    }

    let Some(bytes) = state.bytes(dependency) else {
        return Some(Err(format!("package for {address} resolved to an empty handle")));
    };
    state.set_status(id, LoadStatus::Loading);
    let value = match ctx.decoder.decode(&address, &bytes) {
        Ok(value) => value,
        Err(e) => return Some(Err(format!("asset {address} failed to decode: {e}"))),
    };
    if let Some(Node {
        kind: Kind::Asset(asset),
        ..
    }) = state.node_mut(id)
    {
        asset.value = Some(value);
    }
    Some(Ok(()))
}

pub(super) fn unloaded(state: &mut State, ctx: &Context, id: LoadId, address: &str, asset: AssetNode) {
    if state.assets.get(address) == Some(&id) {
        state.assets.remove(address);
    }
    if let Some(dependency) = asset.dependency {
        state.release(ctx, dependency);
    }
}

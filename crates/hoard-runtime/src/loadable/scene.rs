//! Scene loadables. Additive scenes attach to the current single scene and
//! are released with it.

use hoard_core::LoadStatus;
use tracing::debug;

use super::{Kind, LoadId, Node, State, Step, dependency};
use crate::{
    HoardError, SceneMode, SceneTransition,
    context::{Context, Pace},
};

/// Share of scene progress spent loading packages.
const PACKAGE_SHARE: f32 = 0.3;

pub(crate) struct SceneNode {
    path: String,
    mode: SceneMode,
    pub(super) dependency: Option<LoadId>,
    transition: Option<Box<dyn SceneTransition>>,
    children: Vec<LoadId>,
    parent: Option<LoadId>,
}

pub(crate) fn load_scene(state: &mut State, ctx: &Context, address: &str, mode: SceneMode) -> LoadId {
    let path = ctx.registry.resolve_address(address);
    let id = state.insert(
        address.to_string(),
        Kind::Scene(SceneNode {
            path,
            mode,
            dependency: None,
            transition: None,
            children: Vec::new(),
            parent: None,
        }),
    );
    state.scenes.push(id);
    state.acquire(id);

    match mode {
        SceneMode::Single => state.main_scene = Some(id),
        SceneMode::Additive => {
            if let Some(main) = state.main_scene {
                if let Some(Node {
                    kind: Kind::Scene(parent),
                    ..
                }) = state.node_mut(main)
                {
                    parent.children.push(id);
                    // The parent owns one reference until it unloads.
                    state.acquire(id);
                    if let Some(Node {
                        kind: Kind::Scene(scene),
                        ..
                    }) = state.node_mut(id)
                    {
                        scene.parent = Some(main);
                    }
                }
            }
        }
    }

    state.start(ctx, id);
    id
}

pub(super) fn start(state: &mut State, ctx: &Context, id: LoadId) -> Step {
    let path = match state.node(id).map(|n| &n.kind) {
        Some(Kind::Scene(scene)) => scene.path.clone(),
        _ => return Some(Err(format!("loadable {id} is not a scene"))),
    };
    let Some(resolved) = ctx.registry.resolve(&path) else {
        return Some(Err(HoardError::NotFound(path).to_string()));
    };

    let dependency = dependency::request(state, ctx, resolved);
    if let Some(Node {
        status,
        kind: Kind::Scene(scene),
        ..
    }) = state.node_mut(id)
    {
        scene.dependency = Some(dependency);
        *status = LoadStatus::DependentLoading;
    }
    None
}

pub(super) fn update(state: &mut State, ctx: &Context, id: LoadId, pace: Pace) -> Step {
    match state.status(id) {
        LoadStatus::DependentLoading => packages_loaded(state, ctx, id, pace),
        LoadStatus::Loading => activated(state, id, pace),
        other => Some(Err(format!("scene {id} in unexpected state {other:?}"))),
    }
}

fn packages_loaded(state: &mut State, ctx: &Context, id: LoadId, pace: Pace) -> Step {
    let (address, mode, dependency) = match state.node(id) {
        Some(Node {
            address,
            kind:
                Kind::Scene(SceneNode {
                    mode,
                    dependency: Some(dependency),
                    ..
                }),
            ..
        }) => (address.clone(), *mode, *dependency),
        _ => return Some(Err(format!("scene {id} has no dependency"))),
    };

    if pace == Pace::Immediate {
        state.load_immediately(ctx, dependency);
    }
    let failed = || Some(Err(format!("scene {address} failed to load its package")));
    let Some(node) = state.node(dependency) else {
        return failed();
    };
    match node.status {
        LoadStatus::LoadSuccessful => {}
        LoadStatus::LoadFailed => return failed(),
        _ => {
            let progress = node.progress * PACKAGE_SHARE;
            state.set_progress(id, progress);
            return None;
        }
    }
    if state.bytes(dependency).is_none() {
        return failed();
    }

    if pace == Pace::Immediate {
        return Some(ctx.scene_host.load(&address, mode));
    }
    let transition = match ctx.scene_host.begin(&address, mode) {
        Ok(transition) => transition,
        Err(e) => return Some(Err(e)),
    };
    if let Some(Node {
        status,
        progress,
        kind: Kind::Scene(scene),
        ..
    }) = state.node_mut(id)
    {
        scene.transition = Some(transition);
        *status = LoadStatus::Loading;
        *progress = PACKAGE_SHARE;
    }
    None
}

fn activated(state: &mut State, id: LoadId, pace: Pace) -> Step {
    let Some(Node {
        progress,
        kind:
            Kind::Scene(SceneNode {
                transition: Some(transition),
                ..
            }),
        ..
    }) = state.node_mut(id)
    else {
        return Some(Err(format!("scene {id} has no transition")));
    };

    if pace == Pace::Immediate {
        futures::executor::block_on(transition.activated());
    }
    *progress = PACKAGE_SHARE + (1.0 - PACKAGE_SHARE) * transition.progress().clamp(0.0, 1.0);
    transition.is_done().then_some(Ok(()))
}

pub(super) fn unloaded(
    state: &mut State,
    ctx: &Context,
    id: LoadId,
    address: &str,
    previous: LoadStatus,
    scene: SceneNode,
) {
    state.scenes.retain(|s| *s != id);
    if state.main_scene == Some(id) {
        state.main_scene = None;
    }

    match scene.mode {
        SceneMode::Single => {
            for child in scene.children {
                if let Some(Node {
                    kind: Kind::Scene(child_scene),
                    ..
                }) = state.node_mut(child)
                {
                    child_scene.parent = None;
                }
                state.release(ctx, child);
            }
        }
        SceneMode::Additive => {
            if let Some(parent) = scene.parent {
                if let Some(Node {
                    kind: Kind::Scene(parent_scene),
                    ..
                }) = state.node_mut(parent)
                {
                    parent_scene.children.retain(|c| *c != id);
                }
            }
            if previous == LoadStatus::LoadSuccessful {
                debug!(scene = %address, "additive scene torn down");
                ctx.scene_host.unload(address);
            }
        }
    }

    if let Some(dependency) = scene.dependency {
        state.release(ctx, dependency);
    }
}

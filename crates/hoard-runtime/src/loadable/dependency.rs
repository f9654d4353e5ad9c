//! Dependency loadables: a main package plus its dependency packages, keyed
//! by the main package's `name_with_hash`. Sibling assets share one node.

use hoard_core::LoadStatus;
use hoard_manifest::Resolved;

use super::{Kind, LoadId, State, Step, package};
use crate::context::{Context, Pace};

pub(crate) struct DependencyNode {
    key: String,
    /// Main package first.
    packages: Vec<LoadId>,
}

impl DependencyNode {
    pub(super) fn main(&self) -> Option<LoadId> {
        self.packages.first().copied()
    }
}

pub(super) fn request(state: &mut State, ctx: &Context, resolved: Resolved) -> LoadId {
    let key = resolved.main.name_with_hash();
    if let Some(&id) = state.dependencies.get(&key) {
        state.acquire(id);
        return id;
    }

    let mut packages = Vec::with_capacity(1 + resolved.dependencies.len());
    packages.push(package::request(state, ctx, resolved.main));
    for info in resolved.dependencies {
        packages.push(package::request(state, ctx, info));
    }

    let id = state.insert(
        key.clone(),
        Kind::Dependency(DependencyNode {
            key: key.clone(),
            packages,
        }),
    );
    state.dependencies.insert(key, id);
    state.acquire(id);
    state.start(ctx, id);
    id
}

pub(super) fn start(state: &mut State, ctx: &Context, id: LoadId) -> Step {
    state.set_status(id, LoadStatus::Loading);
    update(state, ctx, id, Pace::Tick)
}

pub(super) fn update(state: &mut State, ctx: &Context, id: LoadId, pace: Pace) -> Step {
    let packages = match state.node(id).map(|n| &n.kind) {
        Some(Kind::Dependency(dependency)) => dependency.packages.clone(),
        _ => return Some(Err(format!("loadable {id} is not a dependency"))),
    };

    if pace == Pace::Immediate {
        for &package in &packages {
            state.load_immediately(ctx, package);
        }
    }

    let mut total = 0.0;
    let mut done = true;
    for &package in &packages {
        let Some(node) = state.node(package) else {
            return Some(Err(format!("package {package} was unloaded while still needed")));
        };
        match node.status {
            LoadStatus::LoadFailed => {
                return Some(Err(node
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("package {} failed to load", node.address))));
            }
            LoadStatus::LoadSuccessful => total += 1.0,
            _ => {
                total += node.progress;
                done = false;
            }
        }
    }

    let count = packages.len().max(1) as f32;
    state.set_progress(id, total / count);
    done.then_some(Ok(()))
}

pub(super) fn unloaded(state: &mut State, ctx: &Context, id: LoadId, dependency: DependencyNode) {
    if state.dependencies.get(&dependency.key) == Some(&id) {
        state.dependencies.remove(&dependency.key);
    }
    for package in dependency.packages {
        state.release(ctx, package);
    }
}

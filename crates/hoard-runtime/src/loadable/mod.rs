//! Reference-counted loadables and the caches that own them.
//!
//! Every loadable lives in one arena keyed by [`LoadId`]. Kinds refer to each
//! other by id (asset -> dependency -> packages, scene -> children), never by
//! pointer, so unloading one node cannot leave another dangling.
//!
//! A loadable whose count drops to zero is parked on the unused list and
//! unloaded by a later tick, unless it was re-acquired in the meantime.
//! Dependencies are the exception: they have no value of their own and are
//! unloaded the moment their count reaches zero.

mod asset;
mod dependency;
mod package;
mod raw_file;
mod scene;

use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::Arc,
};

use bytes::Bytes;
use hoard_core::{Budget, Completion, LoadStatus, Reference};
use hoard_events::LoadEvent;
use tracing::{debug, trace, warn};

pub(crate) use self::{asset::request_asset, raw_file::request_raw_file, scene::load_scene};
use self::{
    asset::AssetNode, dependency::DependencyNode, package::PackageNode, raw_file::RawFileNode,
    scene::SceneNode,
};
use crate::{
    AssetValue, PackageSource,
    context::{Context, Pace},
};

pub(crate) type LoadId = u64;

/// Point-in-time view of a loadable, handed to completion callbacks.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadSnapshot {
    pub address: String,
    pub status: LoadStatus,
    pub progress: f32,
    pub error: Option<String>,
}

impl LoadSnapshot {
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == LoadStatus::LoadSuccessful
    }
}

/// Sizes of the loadable caches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub packages: usize,
    pub dependencies: usize,
    pub assets: usize,
    /// Every live loadable, including uncached raw files and scenes.
    pub loadables: usize,
    pub loading: usize,
    pub unused: usize,
}

pub(crate) enum Kind {
    Package(PackageNode),
    Dependency(DependencyNode),
    Asset(AssetNode),
    RawFile(RawFileNode),
    Scene(SceneNode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    Package,
    Dependency,
    Asset,
    RawFile,
    Scene,
}

impl Kind {
    fn tag(&self) -> Tag {
        match self {
            Self::Package(_) => Tag::Package,
            Self::Dependency(_) => Tag::Dependency,
            Self::Asset(_) => Tag::Asset,
            Self::RawFile(_) => Tag::RawFile,
            Self::Scene(_) => Tag::Scene,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::Dependency(_) => "dependency",
            Self::Asset(_) => "asset",
            Self::RawFile(_) => "raw_file",
            Self::Scene(_) => "scene",
        }
    }
}

pub(crate) struct Node {
    pub address: String,
    pub status: LoadStatus,
    pub progress: f32,
    pub error: Option<String>,
    pub refs: Reference,
    pub completion: Arc<Completion<LoadSnapshot>>,
    pub kind: Kind,
    parked: bool,
}

impl Node {
    fn snapshot(&self) -> LoadSnapshot {
        LoadSnapshot {
            address: self.address.clone(),
            status: self.status,
            progress: self.progress,
            error: self.error.clone(),
        }
    }
}

/// Outcome of starting or advancing a loadable: `None` while in flight.
pub(crate) type Step = Option<Result<(), String>>;

#[derive(Default)]
pub(crate) struct State {
    nodes: HashMap<LoadId, Node>,
    next_id: LoadId,
    /// Packages by `name_with_hash`.
    packages: HashMap<String, LoadId>,
    /// Current `name_with_hash` per plain package name.
    running: HashMap<String, String>,
    /// Dependencies by main package `name_with_hash`.
    dependencies: HashMap<String, LoadId>,
    /// Assets by address.
    assets: HashMap<String, LoadId>,
    scenes: Vec<LoadId>,
    main_scene: Option<LoadId>,
    loading: VecDeque<LoadId>,
    unused: Vec<LoadId>,
    /// Memoised package sources by `name_with_hash`.
    sources: HashMap<String, PackageSource>,
    fired: Vec<(Arc<Completion<LoadSnapshot>>, LoadSnapshot)>,
}

impl State {
    fn insert(&mut self, address: String, kind: Kind) -> LoadId {
        self.next_id += 1;
        let id = self.next_id;
        trace!(id, address = %address, kind = kind.label(), "loadable created");
        self.nodes.insert(
            id,
            Node {
                address,
                status: LoadStatus::Init,
                progress: 0.0,
                error: None,
                refs: Reference::new(),
                completion: Arc::new(Completion::new()),
                kind,
                parked: false,
            },
        );
        id
    }

    pub(crate) fn node(&self, id: LoadId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn node_mut(&mut self, id: LoadId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn set_status(&mut self, id: LoadId, status: LoadStatus) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.status = status;
        }
    }

    fn set_progress(&mut self, id: LoadId, progress: f32) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.progress = progress.clamp(0.0, 1.0);
        }
    }

    pub(crate) fn status(&self, id: LoadId) -> LoadStatus {
        self.nodes.get(&id).map_or(LoadStatus::Unloaded, |n| n.status)
    }

    pub(crate) fn snapshot(&self, id: LoadId) -> Option<LoadSnapshot> {
        self.nodes.get(&id).map(Node::snapshot)
    }

    pub(crate) fn acquire(&mut self, id: LoadId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.refs.increase();
        }
    }

    /// Begin loading a freshly created node.
    fn start(&mut self, ctx: &Context, id: LoadId) {
        let Some(tag) = self.nodes.get(&id).map(|n| n.kind.tag()) else {
            return;
        };
        let step = match tag {
            Tag::Package => package::start(self, ctx, id),
            Tag::Dependency => dependency::start(self, ctx, id),
            Tag::Asset => asset::start(self, ctx, id),
            Tag::RawFile => raw_file::start(self, ctx, id),
            Tag::Scene => scene::start(self, ctx, id),
        };
        match step {
            Some(result) => self.finish(ctx, id, result),
            None => self.loading.push_back(id),
        }
    }

    /// Advance one node. Returns `true` once it is terminal or gone.
    fn update(&mut self, ctx: &Context, id: LoadId, pace: Pace) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return true;
        };
        if node.status.is_done() {
            return true;
        }
        let step = match node.kind.tag() {
            Tag::Package => package::update(self, ctx, id, pace),
            Tag::Dependency => dependency::update(self, ctx, id, pace),
            Tag::Asset => asset::update(self, ctx, id, pace),
            Tag::RawFile => raw_file::update(self, ctx, id, pace),
            Tag::Scene => scene::update(self, ctx, id, pace),
        };
        match step {
            Some(result) => {
                self.finish(ctx, id, result);
                true
            }
            None => false,
        }
    }

    fn finish(&mut self, ctx: &Context, id: LoadId, result: Result<(), String>) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        match result {
            Ok(()) => {
                node.status = LoadStatus::LoadSuccessful;
                node.progress = 1.0;
                debug!(address = %node.address, kind = node.kind.label(), "load finished");
            }
            Err(error) => {
                warn!(address = %node.address, kind = node.kind.label(), %error, "load failed");
                node.status = LoadStatus::LoadFailed;
                node.progress = 1.0;
                node.error = Some(error);
            }
        }
        ctx.events.publish(LoadEvent::Finished {
            address: node.address.clone(),
            kind: node.kind.label(),
            error: node.error.clone(),
        });
        self.fired.push((Arc::clone(&node.completion), node.snapshot()));
    }

    /// Drive a node to a terminal state on the calling thread.
    pub(crate) fn load_immediately(&mut self, ctx: &Context, id: LoadId) {
        // A node with nothing left to poll reports terminal on the first call.
        while !self.update(ctx, id, Pace::Immediate) {}
    }

    /// Drop one reference. Unused nodes are parked for the sweep.
    pub(crate) fn release(&mut self, ctx: &Context, id: LoadId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if !node.refs.decrease() {
            warn!(address = %node.address, "release without matching acquire");
            return;
        }
        if !node.refs.is_unused() {
            return;
        }
        if node.kind.tag() == Tag::Dependency {
            self.unload(ctx, id);
        } else if !node.parked {
            node.parked = true;
            self.unused.push(id);
        }
    }

    fn unload(&mut self, ctx: &Context, id: LoadId) {
        let Some(mut node) = self.nodes.remove(&id) else {
            return;
        };
        let previous = std::mem::replace(&mut node.status, LoadStatus::Unloaded);
        let address = node.address.clone();
        let label = node.kind.label();
        match node.kind {
            Kind::Package(package) => package::unloaded(self, id, &address, package),
            Kind::Dependency(dependency) => dependency::unloaded(self, ctx, id, dependency),
            Kind::Asset(asset) => asset::unloaded(self, ctx, id, &address, asset),
            Kind::RawFile(_) => {}
            Kind::Scene(scene) => {
                scene::unloaded(self, ctx, id, &address, previous, scene);
            }
        }
        debug!(address = %address, kind = label, "unloaded");
        ctx.events.publish(LoadEvent::Unloaded {
            address,
            kind: label,
        });
    }

    /// One scheduler pass: advance in-flight nodes, then sweep unused ones.
    pub(crate) fn tick(&mut self, ctx: &Context, budget: &Budget) {
        let mut index = 0;
        while index < self.loading.len() {
            if budget.is_busy() {
                return;
            }
            let id = self.loading[index];
            if self.update(ctx, id, Pace::Tick) {
                self.loading.remove(index);
            } else {
                index += 1;
            }
        }

        // Releasing packages mid-transition would pull assets from under the host.
        if self.scene_in_flight() {
            return;
        }

        let mut index = 0;
        while index < self.unused.len() {
            if budget.is_busy() {
                return;
            }
            let id = self.unused[index];
            let Some(node) = self.nodes.get_mut(&id) else {
                self.unused.remove(index);
                continue;
            };
            if node.status.is_loading() {
                index += 1;
                continue;
            }
            node.parked = false;
            let unused = node.refs.is_unused();
            self.unused.remove(index);
            if unused {
                self.unload(ctx, id);
            }
        }
    }

    fn scene_in_flight(&self) -> bool {
        self.scenes.iter().any(|id| {
            self.nodes.get(id).is_some_and(|n| {
                matches!(
                    n.status,
                    LoadStatus::DependentLoading | LoadStatus::Loading
                )
            })
        })
    }

    /// Force-unload everything regardless of reference counts.
    pub(crate) fn unload_all(&mut self, ctx: &Context) {
        let ids: Vec<LoadId> = self.nodes.keys().copied().collect();
        for id in ids {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.refs.reset();
            }
            self.unload(ctx, id);
        }
        self.loading.clear();
        self.unused.clear();
        self.sources.clear();
        self.main_scene = None;
    }

    pub(crate) fn take_fired(&mut self) -> Vec<(Arc<Completion<LoadSnapshot>>, LoadSnapshot)> {
        std::mem::take(&mut self.fired)
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            packages: self.packages.len(),
            dependencies: self.dependencies.len(),
            assets: self.assets.len(),
            loadables: self.nodes.len(),
            loading: self.loading.len(),
            unused: self.unused.len(),
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.loading.is_empty() && self.unused.is_empty()
    }

    /// Bytes behind a node: package contents for packages, assets and
    /// scenes, the file itself for raw files.
    ///
    /// Nodes that borrow their main package's bytes hand them out only once
    /// they loaded successfully themselves.
    pub(crate) fn bytes(&self, id: LoadId) -> Option<Bytes> {
        let node = self.nodes.get(&id)?;
        match &node.kind {
            Kind::Package(package) => package.bytes.clone(),
            Kind::RawFile(raw) => raw.bytes.clone(),
            _ if node.status != LoadStatus::LoadSuccessful => None,
            Kind::Dependency(dependency) => self.bytes(dependency.main()?),
            Kind::Asset(asset) => self.bytes(asset.dependency?),
            Kind::Scene(scene) => self.bytes(scene.dependency?),
        }
    }

    pub(crate) fn asset_value(&self, id: LoadId) -> Option<AssetValue> {
        match &self.nodes.get(&id)?.kind {
            Kind::Asset(asset) => asset.value.clone(),
            _ => None,
        }
    }

    pub(crate) fn file_path(&self, id: LoadId) -> Option<PathBuf> {
        match &self.nodes.get(&id)?.kind {
            Kind::RawFile(raw) => raw.file.clone(),
            _ => None,
        }
    }
}

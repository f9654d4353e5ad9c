use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use hoard_core::Budget;
use hoard_download::{DownloadInfo, DownloadManager};
use hoard_events::{Event, EventBus, Subscription, Topic};
use hoard_manifest::{ManifestCodec, ManifestRegistry, PackageInfo, VersionFile};
use hoard_net::{HttpClient, Net, NetExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::{
    AssetPaths, BytesDecoder, HoardConfig, HoardError, HoardResult, LoadHandle, NoopSceneHost,
    SceneMode, Settings,
    context::{Context, IoRuntime},
    loadable::{self, CacheStats, State},
    operation::{
        ClearHistory, DownloadBatch, DownloadSize, Drive, Driver, GetDownloadSize,
        InitManifests, ManifestUpdate, Operation, OperationHandle, UpdateManifests,
    },
};

pub(crate) struct Inner {
    pub(crate) state: Mutex<State>,
    operations: Mutex<VecDeque<Box<dyn Drive>>>,
    ticking: AtomicBool,
    pub(crate) ctx: Context,
}

impl Inner {
    /// Run `f` under the state lock, then fire the completions it produced.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State, &Context) -> R) -> R {
        let (result, fired) = {
            let mut state = self.state.lock();
            let result = f(&mut state, &self.ctx);
            (result, state.take_fired())
        };
        for (completion, snapshot) in fired {
            completion.complete(snapshot);
        }
        result
    }

    pub(crate) fn enqueue(&self, op: Box<dyn Drive>) {
        self.operations.lock().push_back(op);
    }

    /// Start `op` now; queue it when it needs further ticks.
    fn submit(&self, mut op: Box<dyn Drive>) {
        if op.drive(&self.ctx, &Budget::unlimited()) {
            op.fire();
        } else {
            self.enqueue(op);
        }
    }

    fn drive_operations(&self, budget: &Budget) {
        let mut queue = std::mem::take(&mut *self.operations.lock());
        let mut remaining = VecDeque::with_capacity(queue.len());
        let mut finished = Vec::new();
        while let Some(mut op) = queue.pop_front() {
            if budget.is_busy() {
                remaining.push_back(op);
                remaining.extend(queue.drain(..));
                break;
            }
            if op.drive(&self.ctx, budget) {
                finished.push(op);
            } else {
                remaining.push_back(op);
            }
        }
        {
            let mut operations = self.operations.lock();
            // Operations submitted while driving run after the existing ones.
            remaining.append(&mut operations);
            *operations = remaining;
        }
        for op in finished {
            op.fire();
        }
    }
}

struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Asset delivery runtime.
///
/// Owns the manifest registry, the loadable caches, the download manager and
/// the operation queue. Nothing advances on its own: the host calls
/// [`Hoard::tick`] once per frame (or on a timer), and each tick spends at
/// most the busy budget on loadables, operations and downloads, in that
/// order. Clones share one instance.
#[derive(Clone)]
pub struct Hoard {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Hoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hoard")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Hoard {
    /// Build a runtime.
    ///
    /// # Errors
    ///
    /// Fails when the I/O runtime or the HTTP client cannot be created.
    pub fn new(config: HoardConfig) -> HoardResult<Self> {
        let busy_budget = config.effective_busy_budget();
        let HoardConfig {
            paths,
            settings,
            net,
            downloads,
            crypto,
            event_channel_capacity,
            bus,
            decoder,
            scene_host,
            address_alias,
            runtime,
            transport,
            cancel,
            ..
        } = config;

        let events = bus.unwrap_or_else(|| EventBus::new(event_channel_capacity));
        let cancel = cancel.unwrap_or_default();
        let io = IoRuntime::new(runtime)?;
        let transport: Arc<dyn Net> = match transport {
            Some(transport) => transport,
            None => {
                let client = HttpClient::new(net.clone())
                    .map_err(|e| HoardError::Config(format!("http client: {e}")))?;
                Arc::new(
                    client
                        .with_timeout(net.request_timeout)
                        .with_retry(net.retry.clone()),
                )
            }
        };

        let codec = if settings.encrypted {
            ManifestCodec::encrypted(crypto.clone())
        } else {
            ManifestCodec::plain()
        }
        .with_events(events.clone());
        let mut registry = ManifestRegistry::new().with_events(events.clone());
        if let Some(alias) = address_alias {
            registry = registry.with_alias(alias);
        }
        let downloads = DownloadManager::new(
            Arc::clone(&transport),
            io.handle().clone(),
            downloads,
            events.clone(),
            cancel.child_token(),
        );

        debug!(
            local = %paths.local_dir.display(),
            download = %paths.download_dir.display(),
            encrypted = settings.encrypted,
            offline = settings.offline,
            ?busy_budget,
            "hoard created"
        );
        let ctx = Context {
            paths,
            settings,
            crypto,
            codec,
            registry: Arc::new(registry),
            downloads,
            net: transport,
            events,
            decoder: decoder.unwrap_or_else(|| Arc::new(BytesDecoder)),
            scene_host: scene_host.unwrap_or_else(|| Arc::new(NoopSceneHost)),
            cancel,
            busy_budget,
            io,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                operations: Mutex::new(VecDeque::new()),
                ticking: AtomicBool::new(false),
                ctx,
            }),
        })
    }

    /// Request an asset by path or alias; loads on later ticks.
    pub fn request_asset(&self, address: &str) -> LoadHandle {
        let id = self
            .inner
            .with_state(|state, ctx| loadable::request_asset(state, ctx, address));
        LoadHandle::adopt(Arc::clone(&self.inner), id)
    }

    /// Request an asset and finish loading it before returning.
    pub fn load_asset(&self, address: &str) -> LoadHandle {
        let handle = self.request_asset(address);
        handle.load_immediately();
        handle
    }

    /// Request a raw file. Every call creates a separate loadable.
    pub fn request_raw_file(&self, address: &str) -> LoadHandle {
        let id = self
            .inner
            .with_state(|state, ctx| loadable::request_raw_file(state, ctx, address));
        LoadHandle::adopt(Arc::clone(&self.inner), id)
    }

    pub fn load_raw_file(&self, address: &str) -> LoadHandle {
        let handle = self.request_raw_file(address);
        handle.load_immediately();
        handle
    }

    /// Load a scene; the host's [`crate::SceneHost`] activates it once its
    /// packages are in.
    pub fn load_scene(&self, address: &str, mode: SceneMode) -> LoadHandle {
        let id = self
            .inner
            .with_state(|state, ctx| loadable::load_scene(state, ctx, address, mode));
        LoadHandle::adopt(Arc::clone(&self.inner), id)
    }

    #[must_use]
    pub fn contains_asset(&self, address: &str) -> bool {
        let registry = &self.inner.ctx.registry;
        registry.contains_asset(&registry.resolve_address(address))
    }

    /// Register the manifests of the newest usable local build.
    pub fn init_manifests(&self) -> OperationHandle<u32> {
        self.submit(InitManifests)
    }

    /// Check the remote version file published for `version` (0 = current).
    pub fn update_manifests(&self, version: u32) -> OperationHandle<ManifestUpdate> {
        self.submit(UpdateManifests::new(VersionFile::for_request(version, false)))
    }

    pub fn update_latest_manifests(&self) -> OperationHandle<ManifestUpdate> {
        self.submit(UpdateManifests::new(VersionFile::Latest))
    }

    /// Download the manifest files an update reported as missing.
    ///
    /// # Errors
    ///
    /// Fails when a download URL or path cannot be built.
    pub fn start_update_manifests(&self, update: &ManifestUpdate) -> HoardResult<DownloadBatch> {
        let paths = &self.inner.ctx.paths;
        let infos = update
            .to_download
            .iter()
            .map(|record| {
                Ok(DownloadInfo::new(
                    paths.download_url(&record.file_name)?,
                    paths.download_path(&record.file_name)?,
                    record.size,
                    record.hash.clone(),
                ))
            })
            .collect::<HoardResult<Vec<_>>>()?;
        Ok(self.download(infos))
    }

    /// Register the manifests fetched by [`Hoard::start_update_manifests`].
    ///
    /// # Errors
    ///
    /// One line per manifest that failed to load. The others are still
    /// registered.
    pub fn refresh_new_manifests(&self, update: &ManifestUpdate) -> Result<(), String> {
        let ctx = &self.inner.ctx;
        let mut failures = Vec::new();
        for record in &update.to_download {
            let manifest = ctx
                .paths
                .download_path(&record.file_name)
                .and_then(|path| ctx.codec.read_manifest(&path, record).map_err(HoardError::from));
            match manifest {
                Ok(manifest) => {
                    ctx.registry.register(manifest);
                }
                Err(e) => failures.push(format!(
                    "failed to load manifest {}, file {}: {e}",
                    record.name, record.file_name
                )),
            }
        }
        if failures.is_empty() {
            ctx.registry
                .set_version_file_name(VersionFile::Current.file_name(ctx.settings.encrypted));
            info!(version = update.version, manifests = update.to_download.len(), "manifests refreshed");
            Ok(())
        } else {
            Err(failures.join("\n"))
        }
    }

    /// Work out which of `packages` still need downloading.
    pub fn download_size(&self, packages: Vec<PackageInfo>) -> OperationHandle<DownloadSize> {
        self.submit(GetDownloadSize::new(packages))
    }

    /// [`Hoard::download_size`] for the packages behind asset paths,
    /// dependencies included.
    ///
    /// # Errors
    ///
    /// [`HoardError::NotFound`] when a path is in no manifest.
    pub fn download_size_for(&self, addresses: &[&str]) -> HoardResult<OperationHandle<DownloadSize>> {
        let registry = &self.inner.ctx.registry;
        let mut seen = HashSet::new();
        let mut packages = Vec::new();
        for address in addresses {
            let path = registry.resolve_address(address);
            let resolved = registry
                .resolve(&path)
                .ok_or(HoardError::NotFound(path))?;
            for info in std::iter::once(resolved.main).chain(resolved.dependencies) {
                if seen.insert(info.name_with_hash()) {
                    packages.push(info);
                }
            }
        }
        Ok(self.download_size(packages))
    }

    /// Download a batch of files, reported as one operation.
    pub fn download(&self, infos: Vec<DownloadInfo>) -> DownloadBatch {
        let (batch, driver) = DownloadBatch::new(infos, Arc::downgrade(&self.inner));
        self.inner.submit(Box::new(driver));
        batch
    }

    /// Delete downloaded files no registered manifest refers to.
    pub fn clear_history(&self) -> OperationHandle<usize> {
        self.submit(ClearHistory::new())
    }

    /// Advance loadables, operations and downloads within the busy budget.
    ///
    /// Calls from inside completion callbacks are ignored.
    pub fn tick(&self) {
        let inner = &self.inner;
        if inner.ticking.swap(true, Ordering::AcqRel) {
            trace!("re-entrant tick ignored");
            return;
        }
        let _guard = TickGuard(&inner.ticking);

        let budget = Budget::start(inner.ctx.busy_budget);
        inner.with_state(|state, ctx| state.tick(ctx, &budget));
        inner.drive_operations(&budget);
        inner.ctx.downloads.update(&budget);
    }

    /// Cancel everything in flight and unload every loadable.
    ///
    /// Handles that outlive the shutdown report [`hoard_core::LoadStatus::Unloaded`].
    pub fn shutdown(&self) {
        let inner = &self.inner;
        info!("hoard shutting down");
        inner.ctx.cancel.cancel();
        inner.ctx.downloads.cancel_all();

        let mut aborted = std::mem::take(&mut *inner.operations.lock());
        for op in &mut aborted {
            op.abort(&inner.ctx);
        }
        for op in &aborted {
            op.fire();
        }

        inner.with_state(|state, ctx| state.unload_all(ctx));
        inner.ctx.registry.clear();
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.ctx.events.subscribe()
    }

    /// Subscribe to runtime events of the given topics only.
    #[must_use]
    pub fn subscribe_to(&self, topics: &[Topic]) -> Subscription {
        self.inner.ctx.events.subscribe_to(topics)
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.ctx.events
    }

    #[must_use]
    pub fn manifests(&self) -> &ManifestRegistry {
        &self.inner.ctx.registry
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.inner.ctx.settings
    }

    #[must_use]
    pub fn paths(&self) -> &AssetPaths {
        &self.inner.ctx.paths
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.state.lock().stats()
    }

    /// Nothing loading, parked, queued or downloading.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.state.lock().is_idle()
            && self.inner.operations.lock().is_empty()
            && self.inner.ctx.downloads.is_idle()
    }

    fn submit<O: Operation>(&self, op: O) -> OperationHandle<O::Output> {
        let (driver, handle) = Driver::new(op);
        self.inner.submit(Box::new(driver));
        handle
    }
}

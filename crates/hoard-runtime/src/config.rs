use std::{fmt, sync::Arc, time::Duration};

use hoard_core::Budget;
use hoard_crypto::CryptoContext;
use hoard_download::DownloadOptions;
use hoard_events::EventBus;
use hoard_manifest::AddressAlias;
use hoard_net::{Net, NetOptions};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{AssetDecoder, AssetPaths, SceneHost, Settings};

/// Configuration for a [`crate::Hoard`] runtime.
#[derive(Clone)]
pub struct HoardConfig {
    /// Directories and base URL.
    pub paths: AssetPaths,
    pub settings: Settings,
    /// Network configuration, including the retry policy.
    pub net: NetOptions,
    pub downloads: DownloadOptions,
    /// Key material for encrypted manifests and packages.
    pub crypto: CryptoContext,
    /// Per-tick allowance. When `None` it follows `settings.high_priority`.
    pub busy_budget: Option<Duration>,
    /// Event bus channel capacity (used when `bus` is not provided).
    pub event_channel_capacity: usize,
    /// Event bus (optional - if not provided, one is created internally).
    pub bus: Option<EventBus>,
    pub decoder: Option<Arc<dyn AssetDecoder>>,
    pub scene_host: Option<Arc<dyn SceneHost>>,
    /// Extra addresses assets can be requested by.
    pub address_alias: Option<AddressAlias>,
    /// Runtime for transfers and blocking reads. When `None` the runtime
    /// owns a small multi-thread runtime.
    pub runtime: Option<Handle>,
    /// Transport override, mainly for tests. When `None` an HTTP client is
    /// built from `net`.
    pub transport: Option<Arc<dyn Net>>,
    /// Cancellation token for graceful shutdown.
    pub cancel: Option<CancellationToken>,
}

impl fmt::Debug for HoardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoardConfig")
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .field("net", &self.net)
            .field("downloads", &self.downloads)
            .field("busy_budget", &self.busy_budget)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .finish_non_exhaustive()
    }
}

impl HoardConfig {
    #[must_use]
    pub fn new(paths: AssetPaths) -> Self {
        Self {
            paths,
            settings: Settings::default(),
            net: NetOptions::default(),
            downloads: DownloadOptions::default(),
            crypto: CryptoContext::default(),
            busy_budget: None,
            event_channel_capacity: 64,
            bus: None,
            decoder: None,
            scene_host: None,
            address_alias: None,
            runtime: None,
            transport: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set network options.
    #[must_use]
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    #[must_use]
    pub fn with_downloads(mut self, downloads: DownloadOptions) -> Self {
        self.downloads = downloads;
        self
    }

    #[must_use]
    pub fn with_crypto(mut self, crypto: CryptoContext) -> Self {
        self.crypto = crypto;
        self
    }

    /// Override the per-tick allowance.
    #[must_use]
    pub fn with_busy_budget(mut self, budget: Duration) -> Self {
        self.busy_budget = Some(budget);
        self
    }

    /// Set event bus channel capacity.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set event bus (shared with other components).
    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn AssetDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    #[must_use]
    pub fn with_scene_host(mut self, host: Arc<dyn SceneHost>) -> Self {
        self.scene_host = Some(host);
        self
    }

    #[must_use]
    pub fn with_address_alias(mut self, alias: AddressAlias) -> Self {
        self.address_alias = Some(alias);
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, net: Arc<dyn Net>) -> Self {
        self.transport = Some(net);
        self
    }

    /// Set cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Allowance actually used per tick.
    #[must_use]
    pub fn effective_busy_budget(&self) -> Duration {
        self.busy_budget.unwrap_or(if self.settings.high_priority {
            Budget::HIGH_PRIORITY
        } else {
            Budget::NORMAL
        })
    }
}

#![forbid(unsafe_code)]

//! # Hoard
//!
//! Facade crate for client-side asset package delivery.
//!
//! ## Quick start
//!
//! ```ignore
//! use hoard::prelude::*;
//!
//! let paths = AssetPaths::new(local, download, temp, base_url, "android");
//! let hoard = Hoard::new(HoardConfig::new(paths))?;
//! let init = hoard.init_manifests();
//!
//! let icon = hoard.request_asset("ui/icon.png");
//! while !icon.is_done() {
//!     hoard.tick();
//! }
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod core {
    pub use hoard_core::*;
}

pub mod events {
    pub use hoard_events::*;
}

pub mod manifest {
    pub use hoard_manifest::*;
}

pub mod download {
    pub use hoard_download::*;
}

pub mod net {
    pub use hoard_net::*;
}

pub mod crypto {
    pub use hoard_crypto::*;
}

// ── Runtime ─────────────────────────────────────────────────────────────

pub use hoard_core::{LoadStatus, OperationStatus};
pub use hoard_runtime::*;

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use hoard_core::{LoadStatus, OperationStatus};
    pub use hoard_events::{Event, EventBus, LoadEvent};
    pub use hoard_manifest::{PackageInfo, VersionFile};
    pub use hoard_runtime::{
        AssetPaths, DownloadBatch, Hoard, HoardConfig, HoardError, HoardResult, LoadHandle,
        SceneMode, Settings,
    };
}

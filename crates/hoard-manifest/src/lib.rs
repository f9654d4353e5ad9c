#![forbid(unsafe_code)]

//! Manifests, version containers and their reconciliation.
//!
//! A [`Manifest`] maps asset paths to the [`PackageInfo`] that contains them.
//! A [`VersionContainer`] lists every manifest file of one published build.
//! [`reconcile`] decides whether the bundled build stays authoritative or
//! which manifest files must be fetched.

mod codec;
mod error;
mod manifest;
mod package;
mod reconcile;
mod registry;
mod version;

pub use codec::ManifestCodec;
pub use error::{ManifestError, ManifestResult};
pub use manifest::Manifest;
pub use package::PackageInfo;
pub use reconcile::{Reconciliation, is_manifest_file_current, reconcile};
pub use registry::{AddressAlias, ManifestRegistry, Resolved};
pub use version::{VersionContainer, VersionFile, VersionRecord};

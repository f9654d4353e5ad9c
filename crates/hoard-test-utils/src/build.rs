//! Writers for package files, manifests and version files.

use std::path::{Path, PathBuf};

use hoard_crypto::CryptoContext;
use hoard_manifest::{Manifest, ManifestCodec, PackageInfo, VersionContainer, VersionFile};

/// A package as published: its manifest entry plus the stored bytes.
#[derive(Clone, Debug)]
pub struct PackageFixture {
    pub info: PackageInfo,
    /// File contents on disk, encrypted when built with a crypto context.
    pub stored: Vec<u8>,
}

/// Package `name` holding `content` and listing `assets`.
///
/// Size and hash describe the stored (possibly encrypted) bytes.
pub fn package(
    name: &str,
    content: &[u8],
    assets: &[&str],
    crypto: Option<&CryptoContext>,
) -> PackageFixture {
    let stored = match crypto {
        Some(ctx) => ctx.encrypt(content).unwrap(),
        None => content.to_vec(),
    };
    let hash = hoard_core::hash_bytes(&stored);
    PackageFixture {
        info: PackageInfo {
            group: String::new(),
            name: name.to_string(),
            hash,
            size: stored.len() as u64,
            raw_file: false,
            assets: assets.iter().map(ToString::to_string).collect(),
            dependencies: Vec::new(),
        },
        stored,
    }
}

impl PackageFixture {
    /// Indices into the manifest's package table.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: &[usize]) -> Self {
        self.info.dependencies = dependencies.to_vec();
        self
    }

    #[must_use]
    pub fn raw(mut self) -> Self {
        self.info.raw_file = true;
        self
    }

    /// File name under which the package is published and stored.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.info.save_file_name()
    }

    /// Write the stored bytes into `dir`, returning the path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(self.file_name());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, &self.stored).unwrap();
        path
    }
}

/// Manifest `name` stored as `{name}.json`.
pub fn manifest(name: &str, packages: &[&PackageFixture]) -> Manifest {
    Manifest::new(
        name,
        format!("{name}.json"),
        packages.iter().map(|p| p.info.clone()).collect(),
    )
    .unwrap()
}

/// Write `manifests` and their version file into `dir`.
pub fn write_build(
    dir: &Path,
    codec: &ManifestCodec,
    version: u32,
    timestamp: i64,
    manifests: &[Manifest],
) -> VersionContainer {
    let records = manifests
        .iter()
        .map(|m| codec.write_manifest(&dir.join(m.file_name()), m).unwrap())
        .collect();
    let container = VersionContainer {
        version,
        timestamp,
        records,
    };
    let file_name = VersionFile::Current.file_name(codec.is_encrypted());
    codec.write_version(&dir.join(file_name), &container).unwrap();
    container
}

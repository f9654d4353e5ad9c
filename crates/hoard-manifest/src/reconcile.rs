use std::path::Path;

use crate::{VersionContainer, VersionRecord};

/// Outcome of comparing the bundled version file against a downloaded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The bundled build is at least as recent; register these records.
    UseLocal {
        version: u32,
        to_register: Vec<VersionRecord>,
    },
    /// The downloaded build is newer; fetch these manifest files.
    Update {
        version: u32,
        to_download: Vec<VersionRecord>,
        download_size: u64,
    },
}

/// Decide between the local and downloaded builds.
///
/// Recency is decided by build timestamp alone: a downloaded container with
/// a higher version but an older or equal timestamp loses.
pub fn reconcile(
    local: &VersionContainer,
    downloaded: &VersionContainer,
    is_effective: impl Fn(&VersionRecord) -> bool,
    is_file_current: impl Fn(&VersionRecord) -> bool,
) -> Reconciliation {
    if downloaded.timestamp <= local.timestamp {
        return Reconciliation::UseLocal {
            version: local.version,
            to_register: local
                .records
                .iter()
                .filter(|r| !is_effective(r))
                .cloned()
                .collect(),
        };
    }

    let to_download: Vec<VersionRecord> = downloaded
        .records
        .iter()
        .filter(|r| !is_file_current(r))
        .cloned()
        .collect();
    Reconciliation::Update {
        version: downloaded.version,
        download_size: to_download.iter().map(|r| r.size).sum(),
        to_download,
    }
}

/// Whether `dir/record.file_name` exists with the record's size and hash.
#[must_use]
pub fn is_manifest_file_current(dir: &Path, record: &VersionRecord) -> bool {
    let path = dir.join(&record.file_name);
    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() == record.size => {
            hoard_core::hash_file(&path).is_ok_and(|hash| hash == record.hash)
        }
        _ => false,
    }
}

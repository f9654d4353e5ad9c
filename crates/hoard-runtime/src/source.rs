//! Package load strategy selection.

use std::path::{Path, PathBuf};

use url::Url;

use crate::Channel;

/// Where a package's bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackageSource {
    /// Plain file on disk.
    Local(PathBuf),
    /// Encrypted file on disk. Built-in encrypted files are first copied
    /// (`needs_unpack`) into the download dir.
    Encrypted { path: PathBuf, needs_unpack: bool },
    /// Fetched into the download dir before loading.
    Remote {
        url: Url,
        dest: PathBuf,
        encrypted: bool,
    },
    /// Fetched into memory, never persisted.
    Streamed(Url),
}

impl PackageSource {
    /// Outcomes that stay valid for the lifetime of the runtime.
    ///
    /// Remote, streamed and needs-unpack outcomes change once the package
    /// becomes resident.
    #[must_use]
    pub fn is_memoizable(&self) -> bool {
        matches!(
            self,
            Self::Local(_)
                | Self::Encrypted {
                    needs_unpack: false,
                    ..
                }
        )
    }
}

/// Facts the source decision is made from.
#[derive(Clone, Copy, Debug)]
pub struct SourceInputs<'a> {
    pub encrypted: bool,
    /// Present in the download dir with the expected size.
    pub resident: bool,
    pub offline: bool,
    pub built_in: bool,
    pub channel: Channel,
    pub local_path: &'a Path,
    pub download_path: &'a Path,
    pub url: &'a Url,
}

/// Pick the load strategy for one package.
#[must_use]
pub fn select_source(inputs: &SourceInputs<'_>) -> PackageSource {
    let local_first = inputs.offline || inputs.built_in;

    if inputs.channel == Channel::StreamUnfriendly {
        return if local_first {
            PackageSource::Local(inputs.local_path.to_path_buf())
        } else {
            PackageSource::Streamed(inputs.url.clone())
        };
    }

    if inputs.encrypted {
        if inputs.resident {
            return PackageSource::Encrypted {
                path: inputs.download_path.to_path_buf(),
                needs_unpack: false,
            };
        }
        if local_first {
            return PackageSource::Encrypted {
                path: inputs.local_path.to_path_buf(),
                needs_unpack: true,
            };
        }
    } else if local_first {
        return PackageSource::Local(inputs.local_path.to_path_buf());
    } else if inputs.resident {
        return PackageSource::Local(inputs.download_path.to_path_buf());
    }

    PackageSource::Remote {
        url: inputs.url.clone(),
        dest: inputs.download_path.to_path_buf(),
        encrypted: inputs.encrypted,
    }
}

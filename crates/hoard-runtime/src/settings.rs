use std::{collections::HashSet, fs, io, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{HoardError, HoardResult};

/// Platform delivery channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Standard,
    /// No local file system for packages: everything is fetched into memory
    /// and manifest updates are skipped.
    StreamUnfriendly,
}

/// Runtime switches, usually shipped next to the built-in packages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Never touch the network; every package is read from the local dir.
    pub offline: bool,
    /// Manifests, version files and packages are encrypted.
    pub encrypted: bool,
    /// Package files shipped in the local dir, by `name_with_hash`.
    pub built_in: HashSet<String>,
    /// Use the larger per-tick busy budget.
    pub high_priority: bool,
    pub channel: Channel,
}

impl Settings {
    /// Read an overrides file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// [`HoardError::Config`] when the file exists but is not valid JSON.
    pub fn load(path: &Path) -> HoardResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map_err(|e| HoardError::Config(format!("{}: {e}", path.display())))
    }

    #[must_use]
    pub fn is_built_in(&self, name_with_hash: &str) -> bool {
        self.built_in.contains(name_with_hash)
    }

    /// Manifest updates and package downloads are skipped.
    #[must_use]
    pub fn skips_updates(&self) -> bool {
        self.offline || self.channel == Channel::StreamUnfriendly
    }

    #[must_use]
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    #[must_use]
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    #[must_use]
    pub fn with_built_in<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.built_in.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_high_priority(mut self, high_priority: bool) -> Self {
        self.high_priority = high_priority;
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }
}

use crate::{DownloadEvent, LoadEvent, ManifestEvent, OperationEvent};

/// Unified runtime event.
///
/// Hierarchical: each subsystem has its own variant with a sub-enum.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Download(DownloadEvent),
    Manifest(ManifestEvent),
    Load(LoadEvent),
    Operation(OperationEvent),
}

/// Subsystem an [`Event`] comes from. Used to filter subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Download,
    Manifest,
    Load,
    Operation,
}

impl Event {
    #[must_use]
    pub fn topic(&self) -> Topic {
        match self {
            Self::Download(_) => Topic::Download,
            Self::Manifest(_) => Topic::Manifest,
            Self::Load(_) => Topic::Load,
            Self::Operation(_) => Topic::Operation,
        }
    }
}

impl From<DownloadEvent> for Event {
    fn from(e: DownloadEvent) -> Self {
        Self::Download(e)
    }
}

impl From<ManifestEvent> for Event {
    fn from(e: ManifestEvent) -> Self {
        Self::Manifest(e)
    }
}

impl From<LoadEvent> for Event {
    fn from(e: LoadEvent) -> Self {
        Self::Load(e)
    }
}

impl From<OperationEvent> for Event {
    fn from(e: OperationEvent) -> Self {
        Self::Operation(e)
    }
}

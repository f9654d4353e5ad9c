/// Lifecycle of a loadable.
///
/// States only move forward, except for the final transition to
/// [`LoadStatus::Unloaded`]. A concrete loadable kind visits a subset of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    #[default]
    Init,
    CheckingVersion,
    DependentLoading,
    Unpacking,
    Loading,
    LoadSuccessful,
    LoadFailed,
    Unloaded,
}

impl LoadStatus {
    /// Terminal load outcome (successful or failed).
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(self, Self::LoadSuccessful | Self::LoadFailed)
    }

    /// In flight: past `Init` and not yet terminal.
    #[must_use]
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            Self::CheckingVersion | Self::DependentLoading | Self::Unpacking | Self::Loading
        )
    }

    #[must_use]
    pub fn is_failed(self) -> bool {
        self == Self::LoadFailed
    }
}

/// Lifecycle of a one-shot operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    #[default]
    Init,
    Processing,
    Successful,
    Failed,
}

impl OperationStatus {
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

/// Events emitted by the loadable scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// A loadable reached a terminal state.
    Finished {
        address: String,
        kind: &'static str,
        error: Option<String>,
    },
    /// A loadable was unloaded and dropped from its cache.
    Unloaded { address: String, kind: &'static str },
}

/// Events emitted when one-shot operations finish.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent {
    Finished {
        name: &'static str,
        error: Option<String>,
    },
}

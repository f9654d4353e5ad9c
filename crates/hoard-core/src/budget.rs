use std::time::{Duration, Instant};

/// Per-tick wall-clock allowance.
///
/// Created at the start of a scheduler tick; work loops check
/// [`Budget::is_busy`] between items and yield the rest of the tick once the
/// allowance is spent.
#[derive(Clone, Copy, Debug)]
pub struct Budget {
    started: Instant,
    allowance: Option<Duration>,
}

impl Budget {
    /// Allowance used for normal-priority loading.
    pub const NORMAL: Duration = Duration::from_millis(10);
    /// Allowance used when the host asks for high-priority loading.
    pub const HIGH_PRIORITY: Duration = Duration::from_millis(60);

    #[must_use]
    pub fn start(allowance: Duration) -> Self {
        Self {
            started: Instant::now(),
            allowance: Some(allowance),
        }
    }

    /// Budget that never runs out (synchronous paths).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            started: Instant::now(),
            allowance: None,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.allowance
            .is_some_and(|allowance| self.started.elapsed() >= allowance)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

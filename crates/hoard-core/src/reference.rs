/// Reference counter attached to every cached loadable.
///
/// The count never goes below zero: releasing an unused reference is a no-op
/// and reports `false` so callers can detect unbalanced releases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reference {
    count: u32,
}

impl Reference {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increase(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Decrement the count. Returns `false` when it was already zero.
    pub fn decrease(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.count -= 1;
        true
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.count == 0
    }
}

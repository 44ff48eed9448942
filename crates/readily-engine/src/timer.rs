//! Single-handle deadlines driven by the host clock.

/// One pending deadline per concern.
///
/// Arming replaces whatever was pending, so a slot can never hold two racing
/// deadlines. The host polls [`TimerSlot::fire`] from its tick.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TimerSlot {
    due_ms: Option<u64>,
}

impl TimerSlot {
    pub const fn new() -> Self {
        Self { due_ms: None }
    }

    pub fn arm(&mut self, now_ms: u64, delay_ms: u64) {
        self.due_ms = Some(now_ms.saturating_add(delay_ms));
    }

    pub fn cancel(&mut self) {
        self.due_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due_ms.is_some()
    }

    pub fn due_ms(&self) -> Option<u64> {
        self.due_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.due_ms.is_some_and(|due| now_ms >= due)
    }

    /// Disarms and returns `true` once the deadline has passed.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        if self.is_due(now_ms) {
            self.due_ms = None;
            true
        } else {
            false
        }
    }
}

//! Reader settings and their persistence abstraction.

use log::{debug, warn};

use crate::{chunks::DEFAULT_CHUNK_SIZE, timer::TimerSlot};

pub const SETTINGS_SAVE_DEBOUNCE_MS: u64 = 1_500;

/// User-tunable settings supplied by the settings provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReaderSettings {
    pub wpm: u16,
    pub min_wpm: u16,
    pub max_wpm: u16,
    pub pause_on_punctuation: bool,
    pub auto_scroll_enabled: bool,
    pub chunk_size: usize,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            wpm: 300,
            min_wpm: 100,
            max_wpm: 1_000,
            pause_on_punctuation: true,
            auto_scroll_enabled: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ReaderSettings {
    /// Repairs inverted bounds, out-of-range speed and a zero chunk size.
    pub fn normalized(mut self) -> Self {
        if self.max_wpm < self.min_wpm {
            core::mem::swap(&mut self.max_wpm, &mut self.min_wpm);
        }
        self.min_wpm = self.min_wpm.max(1);
        self.max_wpm = self.max_wpm.max(self.min_wpm);
        self.wpm = self.wpm.clamp(self.min_wpm, self.max_wpm);
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        self
    }
}

/// Abstract settings persistence backend.
pub trait SettingsStore {
    type Error;

    fn load(&mut self) -> Result<Option<ReaderSettings>, Self::Error>;
    fn save(&mut self, settings: &ReaderSettings) -> Result<(), Self::Error>;
}

/// Coalesces settings edits into one save once they stop changing.
#[derive(Clone, Copy, Debug)]
pub struct SettingsSync {
    last_saved: ReaderSettings,
    pending: Option<ReaderSettings>,
    debounce_ms: u64,
    debounce: TimerSlot,
}

impl SettingsSync {
    pub fn new(initial: ReaderSettings) -> Self {
        Self::with_debounce(initial, SETTINGS_SAVE_DEBOUNCE_MS)
    }

    pub fn with_debounce(initial: ReaderSettings, debounce_ms: u64) -> Self {
        Self {
            last_saved: initial,
            pending: None,
            debounce_ms,
            debounce: TimerSlot::new(),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_saved(&self) -> ReaderSettings {
        self.last_saved
    }

    /// Records the live settings; each distinct edit restarts the debounce.
    pub fn track_current(&mut self, current: ReaderSettings, now_ms: u64) {
        if current == self.last_saved {
            self.pending = None;
            self.debounce.cancel();
            return;
        }
        if self.pending != Some(current) {
            self.pending = Some(current);
            self.debounce.arm(now_ms, self.debounce_ms);
        }
    }

    /// Saves once the pending edit has been stable for the debounce window.
    /// Returns `true` when a save succeeded.
    pub fn flush_if_due<S: SettingsStore>(&mut self, store: &mut S, now_ms: u64) -> bool {
        if self.pending.is_none() || !self.debounce.fire(now_ms) {
            return false;
        }
        if self.save(store) {
            return true;
        }
        warn!("settings: save failed; retrying after debounce");
        self.debounce.arm(now_ms, self.debounce_ms);
        false
    }

    /// Saves any pending edit right away, used when the reader closes.
    pub fn flush_now<S: SettingsStore>(&mut self, store: &mut S) -> bool {
        if self.pending.is_none() {
            return true;
        }
        self.debounce.cancel();
        self.save(store)
    }

    fn save<S: SettingsStore>(&mut self, store: &mut S) -> bool {
        let Some(candidate) = self.pending else {
            return false;
        };
        if store.save(&candidate).is_err() {
            return false;
        }
        debug!(
            "settings: saved wpm={} auto_scroll={}",
            candidate.wpm, candidate.auto_scroll_enabled
        );
        self.last_saved = candidate;
        self.pending = None;
        true
    }
}

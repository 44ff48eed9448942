//! Cursor ownership and timed word advancement.

use log::{debug, info};

use crate::{
    chunks::{ActiveWindow, ChunkEdge, ChunkManager},
    document::WordToken,
    settings::ReaderSettings,
    timer::TimerSlot,
};

pub const WPM_STEP: u16 = 10;
pub const SKIP_WORDS: usize = 10;
pub const CHUNK_SETTLE_MS: u64 = 1_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlaybackConfig {
    pub wpm: u16,
    pub min_wpm: u16,
    pub max_wpm: u16,
    pub wpm_step: u16,
    pub pause_on_punctuation: bool,
    pub skip_words: usize,
    /// Time given to a freshly shifted window to render before playback resumes.
    pub settle_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self::from_settings(&ReaderSettings::default())
    }
}

impl PlaybackConfig {
    pub fn from_settings(settings: &ReaderSettings) -> Self {
        Self {
            wpm: settings.wpm,
            min_wpm: settings.min_wpm,
            max_wpm: settings.max_wpm,
            wpm_step: WPM_STEP,
            pause_on_punctuation: settings.pause_on_punctuation,
            skip_words: SKIP_WORDS,
            settle_ms: CHUNK_SETTLE_MS,
        }
    }
}

/// Observable playback flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub words_per_minute: u16,
    pub last_punctuation_pause_at: Option<u64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlaybackEvent {
    Idle,
    Advanced {
        cursor: usize,
    },
    /// The cursor stepped into a chunk outside the active one. Playback is
    /// suspended until the settle delay elapses.
    ChunkNavigation {
        from_chunk: usize,
        to_chunk: usize,
        cursor: usize,
    },
    SettleComplete {
        resumed: bool,
    },
    Seeked {
        cursor: usize,
        window_shifted: bool,
    },
    Finished {
        cursor: usize,
        /// Whether this tick moved the cursor onto the last word.
        advanced: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct PunctuationPause {
    word: usize,
    at_ms: u64,
}

pub struct PlaybackScheduler {
    chunks: ChunkManager,
    config: PlaybackConfig,
    cursor: usize,
    playing: bool,
    advance: TimerSlot,
    settle: TimerSlot,
    resume_after_settle: bool,
    punctuation_pause: Option<PunctuationPause>,
}

impl PlaybackScheduler {
    pub fn new(chunks: ChunkManager, mut config: PlaybackConfig) -> Self {
        if config.max_wpm < config.min_wpm {
            core::mem::swap(&mut config.max_wpm, &mut config.min_wpm);
        }
        config.min_wpm = config.min_wpm.max(1);
        config.max_wpm = config.max_wpm.max(config.min_wpm);
        config.wpm = config.wpm.clamp(config.min_wpm, config.max_wpm);

        Self {
            chunks,
            config,
            cursor: 0,
            playing: false,
            advance: TimerSlot::new(),
            settle: TimerSlot::new(),
            resume_after_settle: false,
            punctuation_pause: None,
        }
    }

    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total_words(&self) -> usize {
        self.chunks.total_words()
    }

    pub fn current_word(&self) -> Option<&WordToken> {
        self.chunks.word(self.cursor)
    }

    pub fn active_window(&self) -> ActiveWindow<'_> {
        self.chunks.active_window()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_settling(&self) -> bool {
        self.settle.is_armed()
    }

    pub fn is_finished(&self) -> bool {
        !self.playing && !self.is_settling() && self.cursor == self.chunks.last_word()
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.playing,
            words_per_minute: self.config.wpm,
            last_punctuation_pause_at: self.punctuation_pause.map(|pause| pause.at_ms),
        }
    }

    pub fn base_delay_ms(&self) -> u64 {
        60_000 / u64::from(self.config.wpm.max(1))
    }

    /// Estimated time to reach the last word at the current speed.
    pub fn remaining_ms(&self) -> u64 {
        let remaining = self.chunks.last_word().saturating_sub(self.cursor) as u64;
        remaining.saturating_mul(self.base_delay_ms())
    }

    /// Starts playback. Returns `false` when nothing changed.
    pub fn play(&mut self, now_ms: u64) -> bool {
        if self.total_words() == 0 {
            return false;
        }
        if self.is_settling() {
            let changed = !self.resume_after_settle;
            self.resume_after_settle = true;
            return changed;
        }
        if self.playing {
            return false;
        }

        self.playing = true;
        let delay = self.current_word_delay_ms(now_ms);
        self.advance.arm(now_ms, delay);
        info!(
            "playback: play cursor={} wpm={} delay_ms={}",
            self.cursor, self.config.wpm, delay
        );
        true
    }

    /// Stops playback immediately; no tick fires after a pause.
    pub fn pause(&mut self) -> bool {
        if self.is_settling() {
            let changed = self.resume_after_settle;
            self.resume_after_settle = false;
            return changed;
        }
        if !self.playing {
            return false;
        }

        self.playing = false;
        self.advance.cancel();
        info!("playback: pause cursor={}", self.cursor);
        true
    }

    pub fn toggle(&mut self, now_ms: u64) -> bool {
        let wants_play = if self.is_settling() {
            !self.resume_after_settle
        } else {
            !self.playing
        };

        if wants_play {
            self.play(now_ms)
        } else {
            self.pause()
        }
    }

    /// Cancels every pending timer and stops, used when the reading view closes.
    pub fn cancel_all(&mut self) {
        self.advance.cancel();
        self.settle.cancel();
        self.resume_after_settle = false;
        self.playing = false;
    }

    pub fn tick(&mut self, now_ms: u64) -> PlaybackEvent {
        if self.settle.fire(now_ms) {
            let resumed = self.resume_after_settle;
            self.resume_after_settle = false;
            if resumed {
                self.playing = true;
                let delay = self.current_word_delay_ms(now_ms);
                self.advance.arm(now_ms, delay);
            }
            debug!(
                "playback: settle complete cursor={} resumed={}",
                self.cursor, resumed
            );
            return PlaybackEvent::SettleComplete { resumed };
        }

        if !self.playing || !self.advance.fire(now_ms) {
            return PlaybackEvent::Idle;
        }

        let next = self.cursor + 1;
        if next >= self.total_words() {
            return self.finish(false);
        }

        let next_chunk = self.chunks.position_for(next).chunk_id;
        if self.chunks.is_chunk_boundary(next, ChunkEdge::First)
            && next_chunk != self.chunks.active_chunk()
        {
            return self.navigate_chunk(next, now_ms);
        }

        self.cursor = next;
        if self.cursor == self.chunks.last_word() {
            return self.finish(true);
        }

        let delay = self.current_word_delay_ms(now_ms);
        self.advance.arm(now_ms, delay);
        PlaybackEvent::Advanced {
            cursor: self.cursor,
        }
    }

    fn finish(&mut self, advanced: bool) -> PlaybackEvent {
        self.playing = false;
        self.advance.cancel();
        info!("playback: finished cursor={}", self.cursor);
        PlaybackEvent::Finished {
            cursor: self.cursor,
            advanced,
        }
    }

    fn navigate_chunk(&mut self, next: usize, now_ms: u64) -> PlaybackEvent {
        let from_chunk = self.chunks.active_chunk();
        self.cursor = next;
        self.chunks.sync_to_word(next);
        let to_chunk = self.chunks.active_chunk();

        self.playing = false;
        self.advance.cancel();
        self.resume_after_settle = true;
        self.settle.arm(now_ms, self.config.settle_ms);
        debug!(
            "playback: chunk navigation from={} to={} cursor={} settle_ms={}",
            from_chunk, to_chunk, self.cursor, self.config.settle_ms
        );

        PlaybackEvent::ChunkNavigation {
            from_chunk,
            to_chunk,
            cursor: self.cursor,
        }
    }

    /// Delay before advancing past the word under the cursor.
    ///
    /// A sentence-ending word doubles the base delay once. Re-evaluating the
    /// same word before that doubled delay has elapsed yields the base delay.
    fn current_word_delay_ms(&mut self, now_ms: u64) -> u64 {
        let base = self.base_delay_ms();
        let ends_sentence = self
            .chunks
            .word(self.cursor)
            .is_some_and(|word| word.ends_sentence);
        if !self.config.pause_on_punctuation || !ends_sentence {
            return base;
        }

        let doubled = base.saturating_mul(2);
        if let Some(pause) = self.punctuation_pause
            && pause.word == self.cursor
            && now_ms.saturating_sub(pause.at_ms) < doubled
        {
            return base;
        }

        self.punctuation_pause = Some(PunctuationPause {
            word: self.cursor,
            at_ms: now_ms,
        });
        doubled
    }

    /// Moves the cursor to `index`, clamped into the document.
    pub fn set_cursor(&mut self, index: i64) -> PlaybackEvent {
        let last = self.chunks.last_word();
        let clamped = if index <= 0 {
            0
        } else {
            usize::try_from(index).unwrap_or(usize::MAX).min(last)
        };

        self.cursor = clamped;
        let window_shifted = self.chunks.sync_to_word(clamped);
        debug!(
            "playback: seek requested={} cursor={} window_shifted={}",
            index, clamped, window_shifted
        );
        PlaybackEvent::Seeked {
            cursor: clamped,
            window_shifted,
        }
    }

    pub fn skip(&mut self, delta: i64) -> PlaybackEvent {
        let cursor = i64::try_from(self.cursor).unwrap_or(i64::MAX);
        self.set_cursor(cursor.saturating_add(delta))
    }

    pub fn next_word(&mut self) -> PlaybackEvent {
        self.skip(1)
    }

    pub fn previous_word(&mut self) -> PlaybackEvent {
        self.skip(-1)
    }

    pub fn skip_forward(&mut self) -> PlaybackEvent {
        self.skip(i64::try_from(self.config.skip_words).unwrap_or(i64::MAX))
    }

    pub fn skip_backward(&mut self) -> PlaybackEvent {
        self.skip(-i64::try_from(self.config.skip_words).unwrap_or(i64::MAX))
    }

    pub fn seek_percent(&mut self, percent: f32) -> PlaybackEvent {
        let target = self.chunks.word_for_percent(percent);
        self.set_cursor(i64::try_from(target).unwrap_or(i64::MAX))
    }

    pub fn next_chunk(&mut self) -> PlaybackEvent {
        let target = self.chunks.next_chunk_first_word();
        self.set_cursor(i64::try_from(target).unwrap_or(i64::MAX))
    }

    pub fn previous_chunk(&mut self) -> PlaybackEvent {
        let target = self.chunks.previous_chunk_first_word();
        self.set_cursor(i64::try_from(target).unwrap_or(i64::MAX))
    }

    /// Stops and rewinds to the first word.
    pub fn restart(&mut self) -> PlaybackEvent {
        self.cancel_all();
        self.punctuation_pause = None;
        self.set_cursor(0)
    }

    /// Changes reading speed, re-arming the pending tick when playing.
    pub fn set_wpm(&mut self, wpm: u16, now_ms: u64) -> bool {
        let next = wpm.clamp(self.config.min_wpm, self.config.max_wpm);
        if next == self.config.wpm {
            return false;
        }

        self.config.wpm = next;
        if self.playing {
            let delay = self.current_word_delay_ms(now_ms);
            self.advance.arm(now_ms, delay);
        }
        debug!("playback: wpm={} playing={}", next, self.playing);
        true
    }

    pub fn adjust_wpm(&mut self, increase: bool, now_ms: u64) -> bool {
        let next = if increase {
            self.config.wpm.saturating_add(self.config.wpm_step)
        } else {
            self.config.wpm.saturating_sub(self.config.wpm_step)
        };
        self.set_wpm(next, now_ms)
    }

    pub fn set_pause_on_punctuation(&mut self, enabled: bool) {
        self.config.pause_on_punctuation = enabled;
        if !enabled {
            self.punctuation_pause = None;
        }
    }

    pub fn next_tick_ms(&self) -> Option<u64> {
        match (self.advance.due_ms(), self.settle.due_ms()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, string::String, vec::Vec};

    fn scheduler(text: &str, wpm: u16, pause_on_punctuation: bool) -> PlaybackScheduler {
        let chunks = ChunkManager::from_text(text, 1_000).unwrap();
        PlaybackScheduler::new(
            chunks,
            PlaybackConfig {
                wpm,
                pause_on_punctuation,
                ..PlaybackConfig::default()
            },
        )
    }

    fn numbered(count: usize) -> String {
        let words: Vec<String> = (0..count).map(|i| format!("w{i}")).collect();
        words.join(" ")
    }

    #[test]
    fn play_arms_base_delay() {
        let mut playback = scheduler("one two three", 300, true);
        assert_eq!(playback.base_delay_ms(), 200);
        assert!(playback.play(0));
        assert!(!playback.play(10));
        assert_eq!(playback.tick(199), PlaybackEvent::Idle);
        assert_eq!(playback.tick(200), PlaybackEvent::Advanced { cursor: 1 });
        assert_eq!(playback.next_tick_ms(), Some(400));
    }

    #[test]
    fn pause_cancels_pending_tick() {
        let mut playback = scheduler("one two three", 300, false);
        playback.play(0);
        assert!(playback.pause());
        assert_eq!(playback.tick(10_000), PlaybackEvent::Idle);
        assert_eq!(playback.cursor(), 0);
        assert_eq!(playback.next_tick_ms(), None);
    }

    #[test]
    fn reaches_last_word_and_stops() {
        let mut playback = scheduler(&numbered(50), 600, false);
        playback.set_cursor(48);
        playback.play(0);
        assert_eq!(
            playback.tick(100),
            PlaybackEvent::Finished {
                cursor: 49,
                advanced: true
            }
        );
        assert!(!playback.is_playing());
        assert!(playback.is_finished());
        assert_eq!(playback.tick(10_000), PlaybackEvent::Idle);
    }

    #[test]
    fn playing_from_last_word_finishes_on_first_tick() {
        let mut playback = scheduler("only", 300, false);
        assert!(playback.play(0));
        assert_eq!(
            playback.tick(200),
            PlaybackEvent::Finished {
                cursor: 0,
                advanced: false
            }
        );
    }

    #[test]
    fn punctuation_doubles_delay_once() {
        let mut playback = scheduler("Hello world. Next word here", 300, true);
        playback.set_cursor(1);
        playback.play(0);
        // "world." earns a doubled delay.
        assert_eq!(playback.tick(399), PlaybackEvent::Idle);
        assert_eq!(playback.tick(400), PlaybackEvent::Advanced { cursor: 2 });
        assert_eq!(playback.state().last_punctuation_pause_at, Some(0));
        // "Next" is plain.
        assert_eq!(playback.tick(599), PlaybackEvent::Idle);
        assert_eq!(playback.tick(600), PlaybackEvent::Advanced { cursor: 3 });
    }

    #[test]
    fn punctuation_pause_is_not_reapplied_on_reschedule() {
        let mut playback = scheduler("Stop. here now", 300, true);
        playback.play(0);
        assert_eq!(playback.next_tick_ms(), Some(400));
        // Speed change while still on the same word re-arms without doubling again.
        assert!(playback.set_wpm(600, 50));
        assert_eq!(playback.next_tick_ms(), Some(150));
    }

    #[test]
    fn punctuation_pause_can_be_disabled() {
        let mut playback = scheduler("Stop. here", 300, false);
        playback.play(0);
        assert_eq!(playback.next_tick_ms(), Some(200));
    }

    #[test]
    fn cursor_is_always_clamped() {
        let mut playback = scheduler(&numbered(30), 300, false);
        for request in [-5, 0, 12, 29, 30, 31, 1_000, i64::MIN, i64::MAX] {
            playback.set_cursor(request);
            assert!(playback.cursor() < 30);
        }
        assert_eq!(playback.cursor(), 29);
        playback.set_cursor(-1);
        assert_eq!(playback.cursor(), 0);
        playback.previous_word();
        assert_eq!(playback.cursor(), 0);
    }

    #[test]
    fn manual_navigation_keeps_playback_state() {
        let mut playback = scheduler(&numbered(100), 300, false);
        playback.play(0);
        playback.skip_forward();
        assert_eq!(playback.cursor(), 10);
        playback.next_word();
        assert_eq!(playback.cursor(), 11);
        playback.skip_backward();
        assert_eq!(playback.cursor(), 1);
        assert!(playback.is_playing());
        assert_eq!(playback.state().words_per_minute, 300);

        playback.seek_percent(50.0);
        assert_eq!(playback.cursor(), 49);
    }

    #[test]
    fn chunk_crossing_settles_then_resumes() {
        let mut playback = scheduler(&numbered(1_500), 600, false);
        playback.set_cursor(998);
        playback.play(0);
        assert_eq!(playback.tick(100), PlaybackEvent::Advanced { cursor: 999 });
        assert_eq!(
            playback.tick(200),
            PlaybackEvent::ChunkNavigation {
                from_chunk: 0,
                to_chunk: 1,
                cursor: 1_000
            }
        );
        assert!(!playback.is_playing());
        assert!(playback.is_settling());
        assert_eq!(playback.tick(1_199), PlaybackEvent::Idle);
        assert_eq!(
            playback.tick(1_200),
            PlaybackEvent::SettleComplete { resumed: true }
        );
        assert!(playback.is_playing());
        assert_eq!(playback.tick(1_300), PlaybackEvent::Advanced { cursor: 1_001 });
    }

    #[test]
    fn pause_during_settle_skips_resume() {
        let mut playback = scheduler(&numbered(1_500), 600, false);
        playback.set_cursor(999);
        playback.play(0);
        assert!(matches!(
            playback.tick(100),
            PlaybackEvent::ChunkNavigation { .. }
        ));
        assert!(playback.toggle(150));
        assert_eq!(
            playback.tick(1_100),
            PlaybackEvent::SettleComplete { resumed: false }
        );
        assert!(!playback.is_playing());
    }

    #[test]
    fn seeking_into_another_chunk_shifts_window() {
        let mut playback = scheduler(&numbered(2_500), 300, false);
        assert_eq!(
            playback.next_chunk(),
            PlaybackEvent::Seeked {
                cursor: 1_000,
                window_shifted: true
            }
        );
        assert_eq!(playback.chunks().active_chunk(), 1);
        assert_eq!(
            playback.previous_chunk(),
            PlaybackEvent::Seeked {
                cursor: 0,
                window_shifted: true
            }
        );
        assert_eq!(
            playback.set_cursor(5),
            PlaybackEvent::Seeked {
                cursor: 5,
                window_shifted: false
            }
        );
    }

    #[test]
    fn wpm_is_clamped_to_configured_range() {
        let mut playback = scheduler("a b", 990, false);
        assert!(playback.adjust_wpm(true, 0));
        assert_eq!(playback.state().words_per_minute, 1_000);
        assert!(!playback.adjust_wpm(true, 0));
        assert!(playback.set_wpm(5, 0));
        assert_eq!(playback.state().words_per_minute, 100);
    }

    #[test]
    fn restart_rewinds_and_stops() {
        let mut playback = scheduler(&numbered(20), 300, false);
        playback.set_cursor(15);
        playback.play(0);
        playback.restart();
        assert_eq!(playback.cursor(), 0);
        assert!(!playback.is_playing());
        assert_eq!(playback.remaining_ms(), 19 * 200);
    }
}

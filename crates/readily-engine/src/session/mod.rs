//! One reading session: playback, windowing, auto-scroll and progress wired
//! together behind a single host-driven tick.

use log::{debug, info, warn};

use crate::{
    chunks::{ActiveWindow, ChunkManager, InvalidDocument},
    input::{InputProvider, Key, ViewportEvent},
    playback::{PlaybackConfig, PlaybackEvent, PlaybackScheduler},
    progress::{ProgressConfig, ProgressError, ProgressRecord, ProgressStore, ProgressSync},
    scroll::{AutoScrollController, ScrollAttribution, ScrollConfig, Viewport},
    settings::ReaderSettings,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickResult {
    NoRender,
    RenderRequested,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadingMode {
    /// One word at a time; the viewport never scrolls.
    WordByWord,
    /// Continuous text with the active word highlighted and auto-scrolled.
    FullText,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub settings: ReaderSettings,
    pub mode: ReadingMode,
    pub settle_ms: u64,
    pub scroll: ScrollConfig,
    pub progress: ProgressConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settings: ReaderSettings::default(),
            mode: ReadingMode::FullText,
            settle_ms: crate::playback::CHUNK_SETTLE_MS,
            scroll: ScrollConfig::default(),
            progress: ProgressConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SessionStats {
    pub words_advanced: usize,
    pub chunk_navigations: usize,
    pub manual_scrolls: usize,
    pub progress_write_failures: usize,
}

/// What the rendering layer needs for one frame.
#[derive(Debug)]
pub struct SessionView<'a> {
    pub active_window: ActiveWindow<'a>,
    pub cursor: usize,
    pub total_words: usize,
    pub current_word: &'a str,
    pub is_playing: bool,
    pub auto_scroll_enabled: bool,
    pub words_per_minute: u16,
    pub progress_percent: u8,
    pub remaining_ms: u64,
    pub mode: ReadingMode,
}

pub struct ReadingSession<V, IN>
where
    V: Viewport,
    IN: InputProvider,
{
    playback: PlaybackScheduler,
    scroll: AutoScrollController,
    progress: ProgressSync,
    viewport: V,
    input: IN,
    mode: ReadingMode,
    pending_redraw: bool,
    closed: bool,
    reached_end: bool,
    stats: SessionStats,
}

impl<V, IN> ReadingSession<V, IN>
where
    V: Viewport,
    IN: InputProvider,
{
    /// Tokenizes `text` and prepares a stopped session at word 0.
    pub fn new(
        text: &str,
        user_id: &str,
        file_id: &str,
        config: SessionConfig,
        viewport: V,
        input: IN,
    ) -> Result<Self, InvalidDocument> {
        let settings = config.settings.normalized();
        let chunks = ChunkManager::from_text(text, settings.chunk_size)?;
        let total_words = chunks.total_words();
        let playback = PlaybackScheduler::new(
            chunks,
            PlaybackConfig {
                settle_ms: config.settle_ms,
                ..PlaybackConfig::from_settings(&settings)
            },
        );

        info!(
            "session: open user={} file={} words={} chunks={} mode={:?}",
            user_id,
            file_id,
            total_words,
            playback.chunks().chunk_count(),
            config.mode
        );

        Ok(Self {
            playback,
            scroll: AutoScrollController::new(config.scroll, settings.auto_scroll_enabled),
            progress: ProgressSync::new(user_id, file_id, total_words, config.progress),
            viewport,
            input,
            mode: config.mode,
            pending_redraw: true,
            closed: false,
            reached_end: false,
            stats: SessionStats::default(),
        })
    }

    /// Ensures a progress record exists and moves the cursor to the saved
    /// position. Any persistence failure starts the session at word 0.
    pub async fn resume_from<S: ProgressStore>(&mut self, store: &mut S, now_ms: u64) -> usize {
        let saved = match self.progress.initialize(store).await {
            Ok(record) => record.current_word,
            Err(err) => {
                warn!("session: {}; starting from word 0", err);
                0
            }
        };

        let event = self
            .playback
            .set_cursor(i64::try_from(saved).unwrap_or(i64::MAX));
        self.apply_playback_event(event, now_ms);
        info!(
            "session: resume user={} file={} cursor={}",
            self.progress.user_id(),
            self.progress.file_id(),
            self.playback.cursor()
        );
        self.playback.cursor()
    }

    pub fn playback(&self) -> &PlaybackScheduler {
        &self.playback
    }

    pub fn scroll(&self) -> &AutoScrollController {
        &self.scroll
    }

    pub fn progress(&self) -> &ProgressSync {
        &self.progress
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn input_mut(&mut self) -> &mut IN {
        &mut self.input
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn cursor(&self) -> usize {
        self.playback.cursor()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn is_finished(&self) -> bool {
        self.playback.is_finished()
    }

    /// Whether playback itself ran into the last word. Landing there by a
    /// seek, a step or a resume does not count.
    pub fn reached_end(&self) -> bool {
        self.reached_end
    }

    pub fn view(&self) -> SessionView<'_> {
        let cursor = self.playback.cursor();
        let chunks = self.playback.chunks();
        SessionView {
            active_window: chunks.active_window(),
            cursor,
            total_words: chunks.total_words(),
            current_word: chunks.word(cursor).map_or("", |word| word.text.as_str()),
            is_playing: self.playback.is_playing(),
            auto_scroll_enabled: self.scroll.is_enabled(),
            words_per_minute: self.playback.state().words_per_minute,
            progress_percent: chunks.progress_percent(cursor),
            remaining_ms: self.playback.remaining_ms(),
            mode: self.mode,
        }
    }

    pub fn play(&mut self, now_ms: u64) -> bool {
        if self.closed {
            return false;
        }
        let started = self.playback.play(now_ms);
        self.pending_redraw |= started;
        started
    }

    pub fn pause(&mut self) -> bool {
        let paused = self.playback.pause();
        self.pending_redraw |= paused;
        paused
    }

    pub fn tick(&mut self, now_ms: u64) -> TickResult {
        if self.closed {
            return TickResult::NoRender;
        }

        self.process_inputs(now_ms);

        let event = self.playback.tick(now_ms);
        self.apply_playback_event(event, now_ms);

        if self.mode == ReadingMode::FullText {
            let cursor = self.playback.cursor();
            let playing = self.playback.is_playing();
            let _ = self
                .scroll
                .evaluate(now_ms, &mut self.viewport, cursor, playing);
        }

        if self.pending_redraw {
            self.pending_redraw = false;
            TickResult::RenderRequested
        } else {
            TickResult::NoRender
        }
    }

    /// Next progress record whose debounce has elapsed. The host awaits the
    /// store write itself and reports back through [`Self::complete_progress`],
    /// so ticks keep running while the write is in flight.
    pub fn take_due_progress(&mut self, now_ms: u64) -> Option<ProgressRecord> {
        self.progress.take_due(now_ms)
    }

    /// Next queued progress record regardless of the debounce, for draining
    /// after [`Self::leave`].
    pub fn take_pending_progress(&mut self) -> Option<ProgressRecord> {
        self.progress.take_next()
    }

    pub fn complete_progress<E: core::fmt::Debug>(
        &mut self,
        result: Result<ProgressRecord, E>,
    ) -> Result<(), ProgressError<E>> {
        let completed = self.progress.complete(result);
        if completed.is_err() {
            self.stats.progress_write_failures += 1;
        }
        completed
    }

    /// Closes the reading view: cancels every timer and queues the final
    /// eligible position. Drain it with [`Self::take_pending_progress`].
    pub fn leave(&mut self, now_ms: u64) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.playback.cancel_all();
        self.scroll.cancel();
        self.progress.observe(self.playback.cursor(), now_ms);
        self.progress.cancel();
        info!(
            "session: leave cursor={} pending_progress={} words_advanced={} chunk_navigations={}",
            self.playback.cursor(),
            self.progress.pending_len(),
            self.stats.words_advanced,
            self.stats.chunk_navigations
        );
    }

    /// Applies new provider settings. Chunk size only takes effect in a new session.
    pub fn apply_settings(&mut self, settings: ReaderSettings, now_ms: u64) {
        let settings = settings.normalized();
        if settings.chunk_size != self.playback.chunks().chunk_size() {
            debug!(
                "session: chunk_size={} ignored until next session",
                settings.chunk_size
            );
        }
        self.playback
            .set_pause_on_punctuation(settings.pause_on_punctuation);
        if self.playback.set_wpm(settings.wpm, now_ms) {
            self.pending_redraw = true;
        }
    }

    pub fn toggle_auto_scroll(&mut self, now_ms: u64) {
        if self.scroll.is_enabled() {
            self.scroll.disable();
        } else {
            let cursor = self.playback.cursor();
            self.scroll.enable(now_ms, &mut self.viewport, cursor);
        }
        self.pending_redraw = true;
    }

    fn process_inputs(&mut self, now_ms: u64) {
        loop {
            match self.input.poll_event() {
                Ok(Some(event)) => self.handle_event(event, now_ms),
                Ok(None) => break,
                Err(_) => {
                    warn!("session: input provider failed; skipping remaining events");
                    break;
                }
            }
        }
    }

    pub fn handle_event(&mut self, event: ViewportEvent, now_ms: u64) {
        if self.closed {
            return;
        }

        match event {
            ViewportEvent::Scroll { offset } => {
                if self.mode == ReadingMode::FullText {
                    let attribution = self.scroll.observe_scroll(now_ms, offset);
                    self.apply_scroll_attribution(attribution);
                }
            }
            ViewportEvent::Wheel | ViewportEvent::Touch => {
                if self.mode == ReadingMode::FullText {
                    let attribution = self.scroll.observe_user_gesture(now_ms);
                    self.apply_scroll_attribution(attribution);
                }
            }
            ViewportEvent::Seek { percent } => {
                let event = self.playback.seek_percent(percent);
                self.apply_playback_event(event, now_ms);
            }
            ViewportEvent::Key(key) => self.apply_key(key, now_ms),
        }
    }

    fn apply_key(&mut self, key: Key, now_ms: u64) {
        let event = match key {
            Key::Space => {
                self.pending_redraw |= self.playback.toggle(now_ms);
                return;
            }
            Key::Up | Key::Down => {
                self.pending_redraw |= self.playback.adjust_wpm(matches!(key, Key::Up), now_ms);
                return;
            }
            Key::A => {
                self.toggle_auto_scroll(now_ms);
                return;
            }
            Key::Left => self.playback.previous_word(),
            Key::Right => self.playback.next_word(),
            Key::PageUp => self.playback.skip_backward(),
            Key::PageDown => self.playback.skip_forward(),
            Key::Home => self.playback.restart(),
        };
        self.apply_playback_event(event, now_ms);
    }

    /// Manual scroll hands the viewport to the reader and, in full-text mode,
    /// stops the cursor from running away from what they are looking at.
    fn apply_scroll_attribution(&mut self, attribution: ScrollAttribution) {
        if attribution != ScrollAttribution::User {
            return;
        }
        self.stats.manual_scrolls += 1;
        if self.playback.pause() {
            debug!(
                "session: manual scroll paused playback cursor={}",
                self.playback.cursor()
            );
        }
        self.pending_redraw = true;
    }

    fn apply_playback_event(&mut self, event: PlaybackEvent, now_ms: u64) {
        match event {
            PlaybackEvent::Idle => {}
            PlaybackEvent::Advanced { cursor } => {
                self.stats.words_advanced += 1;
                self.progress.observe(cursor, now_ms);
                self.pending_redraw = true;
            }
            PlaybackEvent::ChunkNavigation { cursor, .. } => {
                self.stats.words_advanced += 1;
                self.stats.chunk_navigations += 1;
                self.scroll.suspend();
                if self.mode == ReadingMode::FullText {
                    self.scroll.reset_to_top(now_ms, &mut self.viewport);
                }
                self.progress.observe(cursor, now_ms);
                self.pending_redraw = true;
            }
            PlaybackEvent::SettleComplete { .. } => {
                self.scroll.resume();
                self.pending_redraw = true;
            }
            PlaybackEvent::Seeked {
                cursor,
                window_shifted,
            } => {
                self.reached_end = false;
                // Restart cancels a pending settle along with its resume.
                if !self.playback.is_settling() {
                    self.scroll.resume();
                }
                if self.mode == ReadingMode::FullText {
                    if window_shifted {
                        self.scroll.reset_to_top(now_ms, &mut self.viewport);
                    }
                    if self.scroll.is_enabled() {
                        self.scroll.recenter(now_ms, &mut self.viewport, cursor);
                    }
                }
                self.progress.observe(cursor, now_ms);
                self.pending_redraw = true;
            }
            PlaybackEvent::Finished { cursor, advanced } => {
                self.reached_end = true;
                if advanced {
                    self.stats.words_advanced += 1;
                }
                self.progress.observe(cursor, now_ms);
                self.pending_redraw = true;
            }
        }
    }
}

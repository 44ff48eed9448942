use std::io::{self, Write};

use log::debug;
use readily_engine::{ProgressRecord, ReadingMode, ScrollBehavior, SessionView, Viewport};

const LINE_HEIGHT_PX: f32 = 20.0;

/// Line-based stand-in for a scrolling text view: the rendered window is laid
/// out `words_per_line` words to a line.
pub(super) struct TerminalViewport {
    top: f32,
    lines: usize,
    words_per_line: usize,
    window_start: usize,
}

impl TerminalViewport {
    pub(super) fn new(lines: usize, words_per_line: usize) -> Self {
        Self {
            top: 0.0,
            lines: lines.max(1),
            words_per_line: words_per_line.max(1),
            window_start: 0,
        }
    }

    /// First global word of the rendered window.
    pub(super) fn set_window_start(&mut self, word: usize) {
        self.window_start = word;
    }

    fn first_visible_line(&self) -> usize {
        (self.top / LINE_HEIGHT_PX) as usize
    }
}

impl Viewport for TerminalViewport {
    fn scroll_top(&self) -> f32 {
        self.top
    }

    fn height(&self) -> f32 {
        self.lines as f32 * LINE_HEIGHT_PX
    }

    fn word_center_y(&self, word_index: usize) -> Option<f32> {
        let local = word_index.checked_sub(self.window_start)?;
        let line = (local / self.words_per_line) as f32;
        Some(line * LINE_HEIGHT_PX + LINE_HEIGHT_PX / 2.0 - self.top)
    }

    fn scroll_to(&mut self, top: f32, behavior: ScrollBehavior) {
        self.top = top.max(0.0);
        debug!(
            "viewport: scroll top={} first_line={} behavior={:?}",
            self.top,
            self.first_visible_line(),
            behavior
        );
    }
}

/// Writes words as playback reaches them.
pub(super) struct TerminalRenderer<W: Write> {
    out: W,
    words_per_line: usize,
    last_cursor: Option<usize>,
    was_playing: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub(super) fn new(out: W, words_per_line: usize) -> Self {
        Self {
            out,
            words_per_line: words_per_line.max(1),
            last_cursor: None,
            was_playing: false,
        }
    }

    pub(super) fn banner(&mut self, view: &SessionView<'_>) -> io::Result<()> {
        writeln!(
            self.out,
            "{} words at {} wpm, starting at word {} (~{}s left)",
            view.total_words,
            view.words_per_minute,
            view.cursor + 1,
            view.remaining_ms / 1_000
        )?;
        writeln!(
            self.out,
            "enter: play/pause  +/-: speed  n/b: word  f/r: skip  s N: seek %  a: auto-scroll  q: quit"
        )?;
        self.out.flush()
    }

    pub(super) fn render(&mut self, view: &SessionView<'_>) -> io::Result<()> {
        if view.is_playing != self.was_playing {
            self.was_playing = view.is_playing;
            if !view.is_playing && !view.current_word.is_empty() {
                writeln!(self.out)?;
                writeln!(
                    self.out,
                    "[paused at word {} of {}, {}%]",
                    view.cursor + 1,
                    view.total_words,
                    view.progress_percent
                )?;
                self.last_cursor = None;
            }
        }

        if self.last_cursor == Some(view.cursor) {
            return self.out.flush();
        }
        let jumped = self
            .last_cursor
            .is_some_and(|last| last + 1 != view.cursor);
        self.last_cursor = Some(view.cursor);

        match view.mode {
            ReadingMode::WordByWord => {
                write!(
                    self.out,
                    "\r\x1b[2K{:>4} wpm {:>3}%  {}",
                    view.words_per_minute, view.progress_percent, view.current_word
                )?;
            }
            ReadingMode::FullText => {
                if jumped {
                    writeln!(self.out)?;
                    writeln!(self.out, "[word {}]", view.cursor + 1)?;
                }
                write!(self.out, "{} ", view.current_word)?;
                if (view.cursor + 1) % self.words_per_line == 0 {
                    writeln!(self.out)?;
                }
            }
        }
        self.out.flush()
    }

    pub(super) fn summary(
        &mut self,
        record: Option<&ProgressRecord>,
        words_advanced: usize,
        chunk_navigations: usize,
    ) -> io::Result<()> {
        writeln!(self.out)?;
        match record {
            Some(record) => writeln!(
                self.out,
                "saved position: word {} of {}",
                record.current_word + 1,
                record.total_words
            )?,
            None => writeln!(self.out, "no position saved")?,
        }
        writeln!(
            self.out,
            "read {} words across {} chunk changes",
            words_advanced, chunk_navigations
        )?;
        self.out.flush()
    }
}

//! Fixed-size windowing over a tokenized document.
//!
//! Chunks are uniform by construction, so mapping a global word index to its
//! chunk is a division. Only the final chunk may be shorter than the nominal
//! size. At most three chunks (the active one and its neighbours) are handed to
//! the rendering layer at any time.

use alloc::vec::Vec;

use log::debug;
use thiserror::Error;

use crate::document::{Document, WordToken};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const MAX_WINDOW_CHUNKS: usize = 3;

/// Chunks resident for rendering: the active chunk plus its neighbours.
pub type ActiveWindow<'a> = heapless::Vec<&'a Chunk, MAX_WINDOW_CHUNKS>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("document has no words to play")]
pub struct InvalidDocument;

/// A contiguous, immutable slice of the document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chunk {
    pub id: usize,
    /// First global word index covered.
    pub start_word: usize,
    /// One past the last global word index covered.
    pub end_word: usize,
    pub words: Vec<WordToken>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.end_word - self.start_word
    }

    pub fn is_empty(&self) -> bool {
        self.start_word == self.end_word
    }

    pub fn contains(&self, global_index: usize) -> bool {
        (self.start_word..self.end_word).contains(&global_index)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WordPosition {
    pub chunk_id: usize,
    pub local_index: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChunkEdge {
    First,
    Last,
}

#[derive(Debug)]
pub struct ChunkManager {
    chunks: Vec<Chunk>,
    chunk_size: usize,
    total_words: usize,
    active: usize,
}

impl ChunkManager {
    /// Splits `document` into chunks of `chunk_size` words.
    ///
    /// # Panics
    ///
    /// A zero `chunk_size` is an invariant violation and panics.
    pub fn new(document: Document, chunk_size: usize) -> Result<Self, InvalidDocument> {
        assert!(chunk_size > 0, "chunk size must be positive");
        if document.is_empty() {
            return Err(InvalidDocument);
        }

        let total_words = document.len();
        let chunk_count = total_words.div_ceil(chunk_size);
        let mut words = document.into_words().into_iter();
        let mut chunks = Vec::with_capacity(chunk_count);
        for id in 0..chunk_count {
            let start_word = id * chunk_size;
            let chunk_words: Vec<WordToken> = words.by_ref().take(chunk_size).collect();
            chunks.push(Chunk {
                id,
                start_word,
                end_word: start_word + chunk_words.len(),
                words: chunk_words,
            });
        }

        debug!(
            "chunks: initialized total_words={} chunk_size={} chunk_count={}",
            total_words,
            chunk_size,
            chunks.len()
        );

        Ok(Self {
            chunks,
            chunk_size,
            total_words,
            active: 0,
        })
    }

    pub fn from_text(text: &str, chunk_size: usize) -> Result<Self, InvalidDocument> {
        Self::new(Document::parse(text), chunk_size)
    }

    pub fn total_words(&self) -> usize {
        self.total_words
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, id: usize) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    pub fn last_chunk_id(&self) -> usize {
        self.chunks.len() - 1
    }

    pub fn last_word(&self) -> usize {
        self.total_words - 1
    }

    /// Chunk and offset for a global index, clamped into the document.
    pub fn position_for(&self, global_index: usize) -> WordPosition {
        let index = global_index.min(self.last_word());
        WordPosition {
            chunk_id: index / self.chunk_size,
            local_index: index % self.chunk_size,
        }
    }

    pub fn word(&self, global_index: usize) -> Option<&WordToken> {
        if global_index >= self.total_words {
            return None;
        }
        let position = self.position_for(global_index);
        self.chunks[position.chunk_id]
            .words
            .get(position.local_index)
    }

    pub fn first_word_of(&self, chunk_id: usize) -> usize {
        self.chunks[chunk_id.min(self.last_chunk_id())].start_word
    }

    pub fn window_around(&self, chunk_id: usize) -> ActiveWindow<'_> {
        let center = chunk_id.min(self.last_chunk_id());
        let first = center.saturating_sub(1);
        let last = (center + 1).min(self.last_chunk_id());

        let mut window = ActiveWindow::new();
        for chunk in &self.chunks[first..=last] {
            // Capacity is exactly the neighbourhood size.
            let _ = window.push(chunk);
        }
        window
    }

    pub fn is_chunk_boundary(&self, global_index: usize, edge: ChunkEdge) -> bool {
        if global_index >= self.total_words {
            return false;
        }
        match edge {
            ChunkEdge::First => global_index % self.chunk_size == 0,
            ChunkEdge::Last => {
                (global_index + 1) % self.chunk_size == 0 || global_index == self.last_word()
            }
        }
    }

    pub fn active_chunk(&self) -> usize {
        self.active
    }

    pub fn active_window(&self) -> ActiveWindow<'_> {
        self.window_around(self.active)
    }

    /// Makes `chunk_id` the active chunk. Returns `true` when it changed.
    pub fn shift_to(&mut self, chunk_id: usize) -> bool {
        let next = chunk_id.min(self.last_chunk_id());
        if next == self.active {
            return false;
        }
        debug!("chunks: window shift from={} to={}", self.active, next);
        self.active = next;
        true
    }

    /// Activates the chunk holding `global_index`. Returns `true` when it changed.
    pub fn sync_to_word(&mut self, global_index: usize) -> bool {
        self.shift_to(self.position_for(global_index).chunk_id)
    }

    pub fn next_chunk_first_word(&self) -> usize {
        let next = (self.active + 1).min(self.last_chunk_id());
        self.first_word_of(next).min(self.last_word())
    }

    pub fn previous_chunk_first_word(&self) -> usize {
        self.first_word_of(self.active.saturating_sub(1))
    }

    /// Position of `global_index` as a whole percentage of the document.
    pub fn progress_percent(&self, global_index: usize) -> u8 {
        let last = self.last_word();
        if last == 0 {
            return 100;
        }
        (global_index.min(last) * 100 / last) as u8
    }

    /// Word index a progress-bar percentage points at.
    pub fn word_for_percent(&self, percent: f32) -> usize {
        let fraction = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0) / 100.0
        };
        let index = (fraction * self.last_word() as f32) as usize;
        index.min(self.last_word())
    }
}

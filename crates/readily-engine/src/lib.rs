#![cfg_attr(not(test), no_std)]

//! Playback and windowing engine for word-by-word and full-text speed reading.
//!
//! The engine is host-clock driven: every time-dependent operation takes
//! `now_ms` from the caller and nothing here sleeps or spawns. Hosts call
//! [`session::ReadingSession::tick`] from their event loop. Progress writes are
//! taken out of the session as plain records, so the host awaits the store on
//! whatever executor it already runs while ticks keep going.

extern crate alloc;

pub mod chunks;
pub mod document;
pub mod input;
pub mod playback;
pub mod progress;
pub mod scroll;
pub mod session;
pub mod settings;
pub mod text_policy;
pub mod timer;

pub use chunks::{Chunk, ChunkEdge, ChunkManager, InvalidDocument, WordPosition};
pub use document::{Document, WordToken};
pub use playback::{PlaybackConfig, PlaybackEvent, PlaybackScheduler, PlaybackState};
pub use progress::{ProgressError, ProgressRecord, ProgressStore, ProgressSync, ProgressTracker};
pub use scroll::{AutoScrollController, ScrollAttribution, ScrollBehavior, ScrollConfig, Viewport};
pub use session::{ReadingMode, ReadingSession, SessionView, TickResult};
pub use settings::ReaderSettings;

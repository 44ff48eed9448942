//! Durable reading position with batched, deduplicated writes.
//!
//! Only batch boundaries and the final word are ever written. The cursor stays
//! authoritative in memory; a failed write is reported to the caller and the
//! reading session carries on.

mod memory;

use alloc::{collections::BTreeMap, string::String};

use log::{debug, warn};
use thiserror::Error;

use crate::timer::TimerSlot;

pub use memory::{MemoryProgressStore, MemoryStoreError};

pub const PROGRESS_BATCH_WORDS: usize = 100;
pub const PROGRESS_SAVE_DEBOUNCE_MS: u64 = 750;
pub const PROGRESS_QUEUE_DEPTH: usize = 8;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProgressRecord {
    pub user_id: String,
    pub file_id: String,
    pub current_word: usize,
    pub total_words: usize,
}

impl ProgressRecord {
    pub fn new(user_id: &str, file_id: &str, current_word: usize, total_words: usize) -> Self {
        Self {
            user_id: String::from(user_id),
            file_id: String::from(file_id),
            current_word,
            total_words,
        }
    }
}

/// External persistence service.
#[allow(async_fn_in_trait)]
pub trait ProgressStore {
    type Error: core::fmt::Debug;

    async fn upsert_progress(
        &mut self,
        record: &ProgressRecord,
    ) -> Result<ProgressRecord, Self::Error>;

    async fn get_progress(
        &mut self,
        user_id: &str,
        file_id: &str,
    ) -> Result<Option<ProgressRecord>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum ProgressError<E> {
    #[error(
        "progress write failed user={user_id} file={file_id} word={current_word}: {cause:?}"
    )]
    WriteFailed {
        user_id: String,
        file_id: String,
        current_word: usize,
        cause: E,
    },
    #[error("progress read failed user={user_id} file={file_id}: {cause:?}")]
    ReadFailed {
        user_id: String,
        file_id: String,
        cause: E,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProgressOutcome {
    NotEligible,
    Duplicate,
    Written(ProgressRecord),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgressConfig {
    pub batch_size: usize,
    pub debounce_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            batch_size: PROGRESS_BATCH_WORDS,
            debounce_ms: PROGRESS_SAVE_DEBOUNCE_MS,
        }
    }
}

/// Write policy plus the last value known to be durable per `(user, file)`.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    batch_size: usize,
    last_persisted: BTreeMap<(String, String), usize>,
}

impl ProgressTracker {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            last_persisted: BTreeMap::new(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_eligible(&self, current_word: usize, total_words: usize) -> bool {
        total_words > 0
            && current_word < total_words
            && (current_word % self.batch_size == 0 || current_word == total_words - 1)
    }

    pub fn last_persisted(&self, user_id: &str, file_id: &str) -> Option<usize> {
        self.last_persisted
            .get(&(String::from(user_id), String::from(file_id)))
            .copied()
    }

    fn remember(&mut self, record: &ProgressRecord) {
        self.last_persisted.insert(
            (record.user_id.clone(), record.file_id.clone()),
            record.current_word,
        );
    }

    /// Persists `current_word` when it is a batch boundary not yet written.
    pub async fn update_progress<S: ProgressStore>(
        &mut self,
        store: &mut S,
        user_id: &str,
        file_id: &str,
        current_word: usize,
        total_words: usize,
    ) -> Result<ProgressOutcome, ProgressError<S::Error>> {
        if !self.is_eligible(current_word, total_words) {
            return Ok(ProgressOutcome::NotEligible);
        }
        if self.last_persisted(user_id, file_id) == Some(current_word) {
            return Ok(ProgressOutcome::Duplicate);
        }

        let record = ProgressRecord::new(user_id, file_id, current_word, total_words);
        match store.upsert_progress(&record).await {
            Ok(saved) => {
                self.remember(&record);
                debug!(
                    "progress: saved user={} file={} word={}/{}",
                    user_id, file_id, current_word, total_words
                );
                Ok(ProgressOutcome::Written(saved))
            }
            Err(cause) => {
                warn!(
                    "progress: write failed user={} file={} word={}/{} err={:?}",
                    user_id, file_id, current_word, total_words, cause
                );
                Err(ProgressError::WriteFailed {
                    user_id: String::from(user_id),
                    file_id: String::from(file_id),
                    current_word,
                    cause,
                })
            }
        }
    }

    /// Creates a zero-position record unless one already exists.
    pub async fn initialize_progress<S: ProgressStore>(
        &mut self,
        store: &mut S,
        user_id: &str,
        file_id: &str,
        total_words: usize,
    ) -> Result<ProgressRecord, ProgressError<S::Error>> {
        if let Some(existing) = self.load_progress(store, user_id, file_id).await? {
            return Ok(existing);
        }

        let record = ProgressRecord::new(user_id, file_id, 0, total_words);
        match store.upsert_progress(&record).await {
            Ok(saved) => {
                self.remember(&saved);
                debug!(
                    "progress: initialized user={} file={} total_words={}",
                    user_id, file_id, total_words
                );
                Ok(saved)
            }
            Err(cause) => {
                warn!(
                    "progress: initialize failed user={} file={} err={:?}",
                    user_id, file_id, cause
                );
                Err(ProgressError::WriteFailed {
                    user_id: String::from(user_id),
                    file_id: String::from(file_id),
                    current_word: 0,
                    cause,
                })
            }
        }
    }

    /// Last durable position, with read failures reported.
    pub async fn load_progress<S: ProgressStore>(
        &mut self,
        store: &mut S,
        user_id: &str,
        file_id: &str,
    ) -> Result<Option<ProgressRecord>, ProgressError<S::Error>> {
        match store.get_progress(user_id, file_id).await {
            Ok(Some(record)) => {
                self.remember(&record);
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(cause) => Err(ProgressError::ReadFailed {
                user_id: String::from(user_id),
                file_id: String::from(file_id),
                cause,
            }),
        }
    }

    /// Last durable position; a failed read is logged and reads as absent.
    pub async fn get_progress<S: ProgressStore>(
        &mut self,
        store: &mut S,
        user_id: &str,
        file_id: &str,
    ) -> Option<ProgressRecord> {
        match self.load_progress(store, user_id, file_id).await {
            Ok(record) => record,
            Err(err) => {
                warn!("progress: {}; starting from word 0", err);
                None
            }
        }
    }
}

/// Per-session queue of eligible positions waiting to be written in order.
///
/// The queue never awaits the store itself. A host takes one record at a time
/// with [`Self::take_due`] or [`Self::take_next`], awaits the write without
/// holding the session, and reports the result through [`Self::complete`].
#[derive(Debug)]
pub struct ProgressSync {
    user_id: String,
    file_id: String,
    total_words: usize,
    debounce_ms: u64,
    tracker: ProgressTracker,
    pending: heapless::Deque<usize, PROGRESS_QUEUE_DEPTH>,
    debounce: TimerSlot,
    draining: bool,
    in_flight: Option<usize>,
}

impl ProgressSync {
    pub fn new(user_id: &str, file_id: &str, total_words: usize, config: ProgressConfig) -> Self {
        Self {
            user_id: String::from(user_id),
            file_id: String::from(file_id),
            total_words,
            debounce_ms: config.debounce_ms,
            tracker: ProgressTracker::new(config.batch_size),
            pending: heapless::Deque::new(),
            debounce: TimerSlot::new(),
            draining: false,
            in_flight: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    pub fn last_persisted(&self) -> Option<usize> {
        self.tracker.last_persisted(&self.user_id, &self.file_id)
    }

    /// Queues the cursor when it lands on an unwritten batch boundary.
    pub fn observe(&mut self, cursor: usize, now_ms: u64) -> bool {
        if !self.tracker.is_eligible(cursor, self.total_words)
            || self.pending.back() == Some(&cursor)
            || (self.pending.is_empty() && self.last_persisted() == Some(cursor))
        {
            return false;
        }

        if self.pending.is_full() {
            // The head may already be on its way to the store.
            let dropped = if self.in_flight.is_some() {
                self.pending.pop_back()
            } else {
                self.pending.pop_front()
            };
            if let Some(dropped) = dropped {
                warn!(
                    "progress: queue full user={} file={} superseded word={}",
                    self.user_id, self.file_id, dropped
                );
            }
        }
        let _ = self.pending.push_back(cursor);
        self.debounce.arm(now_ms, self.debounce_ms);
        true
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.draining || self.debounce.is_due(now_ms)
    }

    /// Drops the debounce deadline; queued positions stay for [`Self::take_next`].
    pub fn cancel(&mut self) {
        self.debounce.cancel();
        self.draining = false;
    }

    pub async fn initialize<S: ProgressStore>(
        &mut self,
        store: &mut S,
    ) -> Result<ProgressRecord, ProgressError<S::Error>> {
        self.tracker
            .initialize_progress(store, &self.user_id, &self.file_id, self.total_words)
            .await
    }

    /// Next record to write once the debounce has elapsed. After it fires the
    /// whole queue is due, one record per call.
    pub fn take_due(&mut self, now_ms: u64) -> Option<ProgressRecord> {
        if self.debounce.fire(now_ms) {
            self.draining = true;
        }
        if !self.draining {
            return None;
        }
        self.take_next()
    }

    /// Next queued record regardless of the debounce. `None` while another
    /// write is still in flight.
    pub fn take_next(&mut self) -> Option<ProgressRecord> {
        if self.in_flight.is_some() {
            return None;
        }
        while let Some(&word) = self.pending.front() {
            if self.last_persisted() == Some(word) {
                let _ = self.pending.pop_front();
                continue;
            }
            self.in_flight = Some(word);
            return Some(ProgressRecord::new(
                &self.user_id,
                &self.file_id,
                word,
                self.total_words,
            ));
        }
        self.draining = false;
        None
    }

    /// Settles the in-flight write. A success becomes the dedup reference; a
    /// failure stays queued and stops the current drain.
    pub fn complete<E: core::fmt::Debug>(
        &mut self,
        result: Result<ProgressRecord, E>,
    ) -> Result<(), ProgressError<E>> {
        let Some(word) = self.in_flight.take() else {
            debug!("progress: completion without a write in flight ignored");
            return Ok(());
        };

        match result {
            Ok(_) => {
                let record =
                    ProgressRecord::new(&self.user_id, &self.file_id, word, self.total_words);
                self.tracker.remember(&record);
                if self.pending.front() == Some(&word) {
                    let _ = self.pending.pop_front();
                }
                debug!(
                    "progress: saved user={} file={} word={}/{}",
                    self.user_id, self.file_id, word, self.total_words
                );
                Ok(())
            }
            Err(cause) => {
                self.draining = false;
                warn!(
                    "progress: write failed user={} file={} word={}/{} err={:?}",
                    self.user_id, self.file_id, word, self.total_words, cause
                );
                Err(ProgressError::WriteFailed {
                    user_id: self.user_id.clone(),
                    file_id: self.file_id.clone(),
                    current_word: word,
                    cause,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn eligibility_follows_batches_and_completion() {
        let tracker = ProgressTracker::new(100);
        assert!(tracker.is_eligible(0, 250));
        assert!(tracker.is_eligible(100, 250));
        assert!(tracker.is_eligible(249, 250));
        assert!(!tracker.is_eligible(150, 250));
        assert!(!tracker.is_eligible(300, 250));
        assert!(!tracker.is_eligible(0, 0));
    }

    #[test]
    fn sequential_updates_write_only_boundaries() {
        let mut store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(100);
        for word in 1..=250 {
            block_on(tracker.update_progress(&mut store, "u", "f", word, 1_000)).unwrap();
        }
        assert_eq!(store.writes(), 2);
        assert_eq!(tracker.last_persisted("u", "f"), Some(200));
    }

    #[test]
    fn completion_word_is_written() {
        let mut store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(100);
        for word in 1..250 {
            block_on(tracker.update_progress(&mut store, "u", "f", word, 250)).unwrap();
        }
        assert_eq!(store.writes(), 3);
        let saved = block_on(store.get_progress("u", "f")).unwrap().unwrap();
        assert_eq!(saved.current_word, 249);
    }

    #[test]
    fn identical_updates_write_once() {
        let mut store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(100);
        let first = block_on(tracker.update_progress(&mut store, "u", "f", 300, 1_000)).unwrap();
        let second = block_on(tracker.update_progress(&mut store, "u", "f", 300, 1_000)).unwrap();
        assert!(matches!(first, ProgressOutcome::Written(_)));
        assert_eq!(second, ProgressOutcome::Duplicate);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn dedup_is_keyed_per_user_and_file() {
        let mut store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(100);
        block_on(tracker.update_progress(&mut store, "u", "a", 100, 1_000)).unwrap();
        block_on(tracker.update_progress(&mut store, "u", "b", 100, 1_000)).unwrap();
        block_on(tracker.update_progress(&mut store, "v", "a", 100, 1_000)).unwrap();
        assert_eq!(store.writes(), 3);
    }

    #[test]
    fn write_failure_is_reported_and_not_remembered() {
        let mut store = MemoryProgressStore::new();
        store.set_fail_writes(true);
        let mut tracker = ProgressTracker::new(100);

        let err = block_on(tracker.update_progress(&mut store, "u", "f", 100, 1_000)).unwrap_err();
        match err {
            ProgressError::WriteFailed { current_word, .. } => assert_eq!(current_word, 100),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tracker.last_persisted("u", "f"), None);

        store.set_fail_writes(false);
        let retry = block_on(tracker.update_progress(&mut store, "u", "f", 100, 1_000)).unwrap();
        assert!(matches!(retry, ProgressOutcome::Written(_)));
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut store = MemoryProgressStore::new();
        let mut tracker = ProgressTracker::new(100);
        let created = block_on(tracker.initialize_progress(&mut store, "u", "f", 500)).unwrap();
        assert_eq!(created.current_word, 0);

        block_on(tracker.update_progress(&mut store, "u", "f", 200, 500)).unwrap();
        let again = block_on(tracker.initialize_progress(&mut store, "u", "f", 500)).unwrap();
        assert_eq!(again.current_word, 200);
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn read_failure_reads_as_absent() {
        let mut store = MemoryProgressStore::new();
        store.set_fail_reads(true);
        let mut tracker = ProgressTracker::new(100);
        assert_eq!(block_on(tracker.get_progress(&mut store, "u", "f")), None);
        assert!(block_on(tracker.load_progress(&mut store, "u", "f")).is_err());
        assert!(block_on(tracker.get_progress(&mut MemoryProgressStore::new(), "u", "f")).is_none());
    }

    fn write_due<S: ProgressStore>(sync: &mut ProgressSync, store: &mut S, now_ms: u64) -> usize {
        let mut written = 0;
        while let Some(record) = sync.take_due(now_ms) {
            let result = block_on(store.upsert_progress(&record));
            if sync.complete(result).is_err() {
                break;
            }
            written += 1;
        }
        written
    }

    #[test]
    fn sync_debounces_and_writes_in_order() {
        let mut store = MemoryProgressStore::new();
        let mut sync = ProgressSync::new("u", "f", 1_000, ProgressConfig::default());

        assert!(!sync.observe(99, 0));
        assert!(sync.observe(100, 0));
        assert!(!sync.observe(100, 10));
        assert!(sync.observe(200, 500));
        assert_eq!(write_due(&mut sync, &mut store, 1_000), 0);
        assert_eq!(write_due(&mut sync, &mut store, 1_250), 2);
        assert_eq!(store.writes(), 2);
        assert_eq!(sync.last_persisted(), Some(200));
        assert!(!sync.observe(200, 2_000));
    }

    #[test]
    fn cursor_keeps_queueing_while_a_write_is_in_flight() {
        let mut store = MemoryProgressStore::new();
        let mut sync = ProgressSync::new("u", "f", 1_000, ProgressConfig::default());
        sync.observe(100, 0);

        let record = sync.take_due(750).unwrap();
        assert_eq!(record.current_word, 100);
        assert_eq!(sync.in_flight(), Some(100));
        assert!(sync.take_next().is_none());

        assert!(sync.observe(200, 760));
        let result = block_on(store.upsert_progress(&record));
        sync.complete(result).unwrap();
        assert_eq!(sync.last_persisted(), Some(100));
        assert_eq!(sync.pending_len(), 1);

        assert_eq!(sync.take_next().unwrap().current_word, 200);
    }

    #[test]
    fn failed_write_keeps_position_queued() {
        let mut store = MemoryProgressStore::new();
        let mut sync = ProgressSync::new("u", "f", 1_000, ProgressConfig::default());
        sync.observe(100, 0);

        store.set_fail_writes(true);
        let record = sync.take_next().unwrap();
        let err = sync.complete(block_on(store.upsert_progress(&record))).unwrap_err();
        assert!(matches!(err, ProgressError::WriteFailed { current_word: 100, .. }));
        assert_eq!(sync.pending_len(), 1);
        assert_eq!(sync.last_persisted(), None);

        store.set_fail_writes(false);
        let record = sync.take_next().unwrap();
        sync.complete(block_on(store.upsert_progress(&record))).unwrap();
        assert_eq!(sync.pending_len(), 0);
        assert!(sync.take_next().is_none());
    }

    #[test]
    fn full_queue_keeps_in_flight_head() {
        let mut sync = ProgressSync::new("u", "f", 100_000, ProgressConfig::default());
        sync.observe(100, 0);
        let record = sync.take_next().unwrap();
        for batch in 2..=(PROGRESS_QUEUE_DEPTH + 2) {
            sync.observe(batch * 100, 0);
        }
        assert_eq!(sync.pending_len(), PROGRESS_QUEUE_DEPTH);

        sync.complete::<MemoryStoreError>(Ok(record)).unwrap();
        assert_eq!(sync.last_persisted(), Some(100));
        assert_eq!(sync.pending_len(), PROGRESS_QUEUE_DEPTH - 1);
    }

    #[test]
    fn full_queue_supersedes_oldest() {
        let mut sync = ProgressSync::new("u", "f", 100_000, ProgressConfig::default());
        for batch in 1..=(PROGRESS_QUEUE_DEPTH + 2) {
            sync.observe(batch * 100, 0);
        }
        assert_eq!(sync.pending_len(), PROGRESS_QUEUE_DEPTH);
    }
}

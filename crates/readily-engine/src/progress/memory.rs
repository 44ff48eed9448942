use alloc::{collections::BTreeMap, string::String};

use thiserror::Error;

use super::{ProgressRecord, ProgressStore};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum MemoryStoreError {
    #[error("progress store unavailable")]
    Unavailable,
}

/// In-process progress backend with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: BTreeMap<(String, String), ProgressRecord>,
    writes: usize,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful upserts so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn record(&self, user_id: &str, file_id: &str) -> Option<&ProgressRecord> {
        self.records
            .get(&(String::from(user_id), String::from(file_id)))
    }
}

impl ProgressStore for MemoryProgressStore {
    type Error = MemoryStoreError;

    async fn upsert_progress(
        &mut self,
        record: &ProgressRecord,
    ) -> Result<ProgressRecord, Self::Error> {
        if self.fail_writes {
            return Err(MemoryStoreError::Unavailable);
        }
        self.records.insert(
            (record.user_id.clone(), record.file_id.clone()),
            record.clone(),
        );
        self.writes += 1;
        Ok(record.clone())
    }

    async fn get_progress(
        &mut self,
        user_id: &str,
        file_id: &str,
    ) -> Result<Option<ProgressRecord>, Self::Error> {
        if self.fail_reads {
            return Err(MemoryStoreError::Unavailable);
        }
        Ok(self.record(user_id, file_id).cloned())
    }
}

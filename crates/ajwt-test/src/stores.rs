//! Storage backends with test-only controls.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use ajwt_storage::{LogRecord, LogStore, StorageError, StorageResult, next_sequence};
use async_trait::async_trait;

type Streams = HashMap<String, BTreeMap<u64, Vec<u8>>>;

/// An in-memory [`LogStore`] that can fail appends and be tampered with.
///
/// Appends follow the same sequencing contract as
/// [`ajwt_storage::MemoryLogStore`]. The `tamper_*` and `remove` methods
/// bypass it to simulate an attacker with write access to the backend.
#[derive(Debug, Default)]
pub struct TestLogStore {
    streams: RwLock<Streams>,
    fail_appends: AtomicBool,
}

impl TestLogStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail with
    /// [`StorageError::Unavailable`] (or stop doing so).
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Rewrite the JSON record at `sequence` in place.
    ///
    /// Returns `false` if the record does not exist or is not JSON.
    pub fn tamper_json(
        &self,
        stream: &str,
        sequence: u64,
        edit: impl FnOnce(&mut serde_json::Value),
    ) -> bool {
        let Ok(mut streams) = self.streams.write() else {
            return false;
        };
        let Some(data) = streams.get_mut(stream).and_then(|s| s.get_mut(&sequence)) else {
            return false;
        };
        let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(data) else {
            return false;
        };
        edit(&mut value);
        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                *data = bytes;
                true
            },
            Err(_) => false,
        }
    }

    /// Delete the record at `sequence`.
    pub fn remove(&self, stream: &str, sequence: u64) -> bool {
        self.streams
            .write()
            .ok()
            .and_then(|mut s| s.get_mut(stream).and_then(|r| r.remove(&sequence)))
            .is_some()
    }

    /// Names of streams starting with `prefix`.
    pub fn streams_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.streams
            .read()
            .map(|s| s.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn to_record((sequence, data): (&u64, &Vec<u8>)) -> LogRecord {
    LogRecord {
        sequence: *sequence,
        data: data.clone(),
    }
}

#[async_trait]
impl LogStore for TestLogStore {
    async fn append(&self, stream: &str, sequence: u64, data: Vec<u8>) -> StorageResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("append disabled by test".into()));
        }
        let mut streams = self.streams.write().map_err(poisoned)?;
        let records = streams.entry(stream.to_string()).or_default();
        let expected = next_sequence(records.last_key_value().map(to_record).as_ref());
        if sequence != expected {
            return Err(StorageError::SequenceConflict {
                stream: stream.to_string(),
                expected,
                actual: sequence,
            });
        }
        records.insert(sequence, data);
        Ok(())
    }

    async fn read(&self, stream: &str) -> StorageResult<Vec<LogRecord>> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams
            .get(stream)
            .map(|r| r.iter().map(to_record).collect())
            .unwrap_or_default())
    }

    async fn last(&self, stream: &str) -> StorageResult<Option<LogRecord>> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams
            .get(stream)
            .and_then(BTreeMap::last_key_value)
            .map(to_record))
    }

    async fn streams(&self) -> StorageResult<Vec<String>> {
        let streams = self.streams.read().map_err(poisoned)?;
        let mut names: Vec<String> = streams
            .iter()
            .filter(|(_, r)| !r.is_empty())
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

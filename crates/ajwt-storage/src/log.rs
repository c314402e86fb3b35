//! Append-only log store trait and the in-memory implementation.
//!
//! A [`LogStore`] holds named streams of opaque records. Each stream accepts
//! exactly one next sequence number: the first record is `1`, and every
//! append must name `last + 1`. Records are never rewritten or removed by
//! the protocol.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::kv::validate_namespace;

/// One record in a log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Position in the stream, starting at 1.
    pub sequence: u64,
    /// Opaque record bytes.
    pub data: Vec<u8>,
}

/// Append-only store of sequenced records.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append a record at `sequence`.
    ///
    /// Fails with [`StorageError::SequenceConflict`] unless `sequence` is
    /// exactly one past the stream's last sequence (or `1` for a new stream).
    async fn append(&self, stream: &str, sequence: u64, data: Vec<u8>) -> StorageResult<()>;

    /// All records in the stream, ordered by sequence.
    async fn read(&self, stream: &str) -> StorageResult<Vec<LogRecord>>;

    /// The record with the highest sequence, if any.
    async fn last(&self, stream: &str) -> StorageResult<Option<LogRecord>>;

    /// Names of all non-empty streams, sorted.
    async fn streams(&self) -> StorageResult<Vec<String>>;
}

/// Validate a stream name. Same rules as a KV namespace.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if the name is empty or contains a
/// null byte.
pub fn validate_stream(stream: &str) -> StorageResult<()> {
    validate_namespace(stream)
}

/// The sequence a stream expects next, given its last record.
#[must_use]
pub fn next_sequence(last: Option<&LogRecord>) -> u64 {
    last.map_or(1, |r| r.sequence.saturating_add(1))
}

/// In-memory log store.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    streams: RwLock<HashMap<String, BTreeMap<u64, Vec<u8>>>>,
}

impl MemoryLogStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, stream: &str, sequence: u64, data: Vec<u8>) -> StorageResult<()> {
        validate_stream(stream)?;
        let mut streams = self
            .streams
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let records = streams.entry(stream.to_string()).or_default();
        let expected = records
            .last_key_value()
            .map_or(1, |(seq, _)| seq.saturating_add(1));
        if sequence != expected {
            debug!(stream, expected, actual = sequence, "log append out of sequence");
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
        validate_stream(stream)?;
        let streams = self
            .streams
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(streams
            .get(stream)
            .map(|records| {
                records
                    .iter()
                    .map(|(seq, data)| LogRecord {
                        sequence: *seq,
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn last(&self, stream: &str) -> StorageResult<Option<LogRecord>> {
        validate_stream(stream)?;
        let streams = self
            .streams
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(streams
            .get(stream)
            .and_then(BTreeMap::last_key_value)
            .map(|(seq, data)| LogRecord {
                sequence: *seq,
                data: data.clone(),
            }))
    }

    async fn streams(&self) -> StorageResult<Vec<String>> {
        let streams = self
            .streams
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let mut names: Vec<String> = streams
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

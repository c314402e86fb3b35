//! The execution logger.

use std::sync::Arc;

use ajwt_core::{InstanceId, StepId, TokenId};
use ajwt_crypto::ContentHash;
use ajwt_storage::{KeyedLocks, KvStore, LogRecord, LogStore, ScopedKvStore, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::entry::{ExecutionLogEntry, LogAnchor};
use crate::error::{LogError, LogResult};

/// KV namespace holding the latest anchor of each instance's log.
pub const ANCHORS_NAMESPACE: &str = "ajwt:log-anchors";

const STREAM_PREFIX: &str = "exec:";

fn stream_for(instance_id: &InstanceId) -> String {
    format!("{STREAM_PREFIX}{instance_id}")
}

/// Input to [`ExecutionLogger::append`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryInput {
    /// The workflow instance.
    pub instance_id: InstanceId,
    /// Must be exactly one past the current tip.
    pub sequence_no: u64,
    /// The authorizing token.
    pub token_id: TokenId,
    /// The step that ran.
    pub step_id: StepId,
}

/// One inconsistency found by [`ExecutionLogger::verify_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogIssue {
    /// A stored record cannot be decoded.
    Undecodable {
        /// Storage sequence of the record.
        sequence_no: u64,
    },
    /// The entry's own sequence number disagrees with its position.
    SequenceMismatch {
        /// Expected position.
        expected: u64,
        /// Sequence number found.
        found: u64,
    },
    /// The entry does not link to its predecessor.
    BrokenLink {
        /// The entry.
        sequence_no: u64,
    },
    /// The stored hash does not match the entry's fields.
    HashMismatch {
        /// The entry.
        sequence_no: u64,
    },
    /// The log is shorter than, or diverges from, its recorded anchor.
    AnchorMismatch {
        /// Anchored sequence number.
        anchored: u64,
        /// Number of entries present.
        present: u64,
    },
}

impl LogIssue {
    /// Sequence number the issue is reported against.
    #[must_use]
    pub fn sequence_no(&self) -> u64 {
        match self {
            Self::Undecodable { sequence_no }
            | Self::BrokenLink { sequence_no }
            | Self::HashMismatch { sequence_no } => *sequence_no,
            Self::SequenceMismatch { expected, .. } => *expected,
            Self::AnchorMismatch { anchored, present } => (*present).min(*anchored).saturating_add(1),
        }
    }

    /// One-line description of the inconsistency.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Undecodable { .. } => "entry cannot be decoded".into(),
            Self::SequenceMismatch { expected, found } => {
                format!("expected sequence {expected}, found {found}")
            },
            Self::BrokenLink { .. } => "previous-entry hash does not match".into(),
            Self::HashMismatch { .. } => "entry hash does not match its contents".into(),
            Self::AnchorMismatch { anchored, present } => {
                format!("anchored at entry {anchored}, {present} entries present")
            },
        }
    }
}

/// Append-only, hash-chained log of executed workflow steps.
///
/// This is the only writer to execution log streams. Appends for one
/// instance are serialized; different instances proceed in parallel.
pub struct ExecutionLogger {
    log: Arc<dyn LogStore>,
    anchors: ScopedKvStore,
    locks: KeyedLocks,
}

impl std::fmt::Debug for ExecutionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLogger").finish_non_exhaustive()
    }
}

impl ExecutionLogger {
    /// Create a logger over `log`, anchoring tips in `kv`.
    ///
    /// # Errors
    ///
    /// [`LogError::Storage`] if the backend rejects the anchor namespace.
    pub fn new(log: Arc<dyn LogStore>, kv: Arc<dyn KvStore>) -> LogResult<Self> {
        Ok(Self {
            log,
            anchors: ScopedKvStore::new(kv, ANCHORS_NAMESPACE)?,
            locks: KeyedLocks::new(),
        })
    }

    /// Append an entry, linking it to the current tip.
    ///
    /// # Errors
    ///
    /// - [`LogError::SequenceGap`] unless `sequence_no` is exactly tip + 1.
    /// - [`LogError::TamperedLog`] if the current tip fails its own hash.
    /// - [`LogError::Storage`] if the append fails. Do not retry blindly:
    ///   re-read the tip first.
    pub async fn append(&self, input: LogEntryInput) -> LogResult<ExecutionLogEntry> {
        let _guard = self.locks.lock(input.instance_id.as_str()).await;
        self.append_locked(input).await
    }

    /// Append the next entry for `instance_id`, choosing the sequence number.
    ///
    /// # Errors
    ///
    /// As [`append`](Self::append), minus the caller-side gap.
    pub async fn append_next(
        &self,
        instance_id: &InstanceId,
        token_id: TokenId,
        step_id: StepId,
    ) -> LogResult<ExecutionLogEntry> {
        let _guard = self.locks.lock(instance_id.as_str()).await;
        let sequence_no = self.next_sequence(instance_id).await?;
        self.append_locked(LogEntryInput {
            instance_id: instance_id.clone(),
            sequence_no,
            token_id,
            step_id,
        })
        .await
    }

    async fn append_locked(&self, input: LogEntryInput) -> LogResult<ExecutionLogEntry> {
        let tip = self.tip(&input.instance_id).await?;
        let expected = tip.as_ref().map_or(0, |t| t.sequence_no).saturating_add(1);
        if input.sequence_no != expected {
            warn!(
                instance_id = %input.instance_id,
                expected,
                actual = input.sequence_no,
                "execution log sequence gap"
            );
            return Err(LogError::SequenceGap {
                instance_id: input.instance_id,
                expected,
                actual: input.sequence_no,
            });
        }
        let prev = match &tip {
            Some(t) if !t.is_intact() => {
                return Err(LogError::TamperedLog {
                    instance_id: input.instance_id,
                    sequence_no: t.sequence_no,
                    reason: "tip hash does not match its contents".into(),
                });
            },
            Some(t) => t.entry_hash,
            None => ContentHash::zero(),
        };

        let entry = ExecutionLogEntry::new(input.sequence_no, input.token_id, input.step_id, prev);
        let data =
            serde_json::to_vec(&entry).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let stream = stream_for(&input.instance_id);
        match self.log.append(&stream, entry.sequence_no, data).await {
            Ok(()) => {},
            Err(StorageError::SequenceConflict {
                expected, actual, ..
            }) => {
                return Err(LogError::SequenceGap {
                    instance_id: input.instance_id,
                    expected,
                    actual,
                });
            },
            Err(e) => {
                error!(instance_id = %input.instance_id, error = %e, "execution log append failed");
                return Err(e.into());
            },
        }

        // The entry is committed; a stale anchor only weakens truncation
        // detection until the next append.
        let anchor = LogAnchor {
            sequence_no: entry.sequence_no,
            entry_hash: entry.entry_hash,
        };
        if let Err(e) = self
            .anchors
            .set_json(input.instance_id.as_str(), &anchor)
            .await
        {
            warn!(instance_id = %input.instance_id, error = %e, "failed to update log anchor");
        }

        debug!(
            instance_id = %input.instance_id,
            sequence_no = entry.sequence_no,
            step_id = %entry.step_id,
            "execution log entry appended"
        );
        Ok(entry)
    }

    /// All entries of an instance, oldest first.
    ///
    /// # Errors
    ///
    /// [`LogError::Storage`] on backend failure or an undecodable entry.
    pub async fn entries(&self, instance_id: &InstanceId) -> LogResult<Vec<ExecutionLogEntry>> {
        self.log
            .read(&stream_for(instance_id))
            .await?
            .iter()
            .map(|r| decode(r).map_err(LogError::from))
            .collect()
    }

    /// The latest entry of an instance.
    ///
    /// # Errors
    ///
    /// [`LogError::Storage`] on backend failure.
    pub async fn tip(&self, instance_id: &InstanceId) -> LogResult<Option<ExecutionLogEntry>> {
        match self.log.last(&stream_for(instance_id)).await? {
            Some(record) => Ok(Some(decode(&record)?)),
            None => Ok(None),
        }
    }

    /// The sequence number the next entry must carry.
    ///
    /// # Errors
    ///
    /// [`LogError::Storage`] on backend failure.
    pub async fn next_sequence(&self, instance_id: &InstanceId) -> LogResult<u64> {
        Ok(self
            .tip(instance_id)
            .await?
            .map_or(0, |t| t.sequence_no)
            .saturating_add(1))
    }

    /// Instances with at least one entry, sorted.
    ///
    /// # Errors
    ///
    /// [`LogError::Storage`] on backend failure.
    pub async fn instances(&self) -> LogResult<Vec<InstanceId>> {
        Ok(self
            .log
            .streams()
            .await?
            .iter()
            .filter_map(|s| s.strip_prefix(STREAM_PREFIX))
            .filter_map(|s| InstanceId::new(s).ok())
            .collect())
    }

    /// Recompute every hash of an instance's log.
    ///
    /// # Errors
    ///
    /// [`LogError::TamperedLog`] for the first inconsistency, or
    /// [`LogError::Storage`] if the log cannot be read.
    pub async fn verify_chain(&self, instance_id: &InstanceId) -> LogResult<()> {
        match self.verify_report(instance_id).await?.first() {
            None => Ok(()),
            Some(issue) => {
                error!(instance_id = %instance_id, sequence_no = issue.sequence_no(), issue = %issue.describe(), "execution log tampering detected");
                Err(LogError::TamperedLog {
                    instance_id: instance_id.clone(),
                    sequence_no: issue.sequence_no(),
                    reason: issue.describe(),
                })
            },
        }
    }

    /// Every inconsistency in an instance's log. Empty means intact.
    ///
    /// # Errors
    ///
    /// [`LogError::Storage`] if the log or anchor cannot be read.
    pub async fn verify_report(&self, instance_id: &InstanceId) -> LogResult<Vec<LogIssue>> {
        let records = self.log.read(&stream_for(instance_id)).await?;
        let anchor: Option<LogAnchor> = self.anchors.get_json(instance_id.as_str()).await?;

        let mut walk = ChainWalk::new(anchor);
        for record in &records {
            match decode(record) {
                Ok(entry) => walk.entry(&entry, record.sequence),
                Err(_) => walk.undecodable(record.sequence),
            }
        }
        Ok(walk.finish())
    }
}

/// Every inconsistency in a run of entries, oldest first, such as an
/// instance log exported by the authority. `anchor`, when known, must match
/// the entry at its sequence number.
#[must_use]
pub fn audit_entries(entries: &[ExecutionLogEntry], anchor: Option<LogAnchor>) -> Vec<LogIssue> {
    let mut walk = ChainWalk::new(anchor);
    for entry in entries {
        walk.entry(entry, entry.sequence_no);
    }
    walk.finish()
}

/// Position-by-position hash chain check.
struct ChainWalk {
    anchor: Option<LogAnchor>,
    prev: ContentHash,
    position: u64,
    anchored_hash: Option<ContentHash>,
    issues: Vec<LogIssue>,
}

impl ChainWalk {
    fn new(anchor: Option<LogAnchor>) -> Self {
        Self {
            anchor,
            prev: ContentHash::zero(),
            position: 0,
            anchored_hash: None,
            issues: Vec::new(),
        }
    }

    fn undecodable(&mut self, stored_sequence: u64) {
        self.position = self.position.saturating_add(1);
        self.issues.push(LogIssue::Undecodable {
            sequence_no: stored_sequence,
        });
    }

    fn entry(&mut self, entry: &ExecutionLogEntry, stored_sequence: u64) {
        self.position = self.position.saturating_add(1);
        let position = self.position;
        if entry.sequence_no != position || stored_sequence != position {
            self.issues.push(LogIssue::SequenceMismatch {
                expected: position,
                found: entry.sequence_no,
            });
        }
        if entry.prev_entry_hash != self.prev {
            self.issues.push(LogIssue::BrokenLink {
                sequence_no: entry.sequence_no,
            });
        }
        if !entry.is_intact() {
            self.issues.push(LogIssue::HashMismatch {
                sequence_no: entry.sequence_no,
            });
        }
        if self.anchor.is_some_and(|a| a.sequence_no == position) {
            self.anchored_hash = Some(entry.entry_hash);
        }
        self.prev = entry.entry_hash;
    }

    fn finish(mut self) -> Vec<LogIssue> {
        if let Some(anchor) = self.anchor
            && self.anchored_hash != Some(anchor.entry_hash)
        {
            self.issues.push(LogIssue::AnchorMismatch {
                anchored: anchor.sequence_no,
                present: self.position,
            });
        }
        self.issues
    }
}

fn decode(record: &LogRecord) -> Result<ExecutionLogEntry, StorageError> {
    serde_json::from_slice(&record.data).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ajwt_storage::{MemoryKvStore, MemoryLogStore, StorageResult};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::RwLock;

    /// Log store that lets tests rewrite or drop stored records.
    #[derive(Default)]
    struct EditableLog(RwLock<BTreeMap<String, Vec<LogRecord>>>);

    impl EditableLog {
        fn edit(&self, stream: &str, f: impl FnOnce(&mut Vec<LogRecord>)) {
            f(self.0.write().unwrap().entry(stream.to_string()).or_default());
        }
    }

    #[async_trait]
    impl LogStore for EditableLog {
        async fn append(&self, stream: &str, sequence: u64, data: Vec<u8>) -> StorageResult<()> {
            let mut map = self.0.write().unwrap();
            let records = map.entry(stream.to_string()).or_default();
            let expected = records.last().map_or(0, |r| r.sequence).saturating_add(1);
            if sequence != expected {
                return Err(StorageError::SequenceConflict {
                    stream: stream.to_string(),
                    expected,
                    actual: sequence,
                });
            }
            records.push(LogRecord { sequence, data });
            Ok(())
        }
        async fn read(&self, stream: &str) -> StorageResult<Vec<LogRecord>> {
            Ok(self.0.read().unwrap().get(stream).cloned().unwrap_or_default())
        }
        async fn last(&self, stream: &str) -> StorageResult<Option<LogRecord>> {
            Ok(self.0.read().unwrap().get(stream).and_then(|r| r.last().cloned()))
        }
        async fn streams(&self) -> StorageResult<Vec<String>> {
            Ok(self.0.read().unwrap().keys().cloned().collect())
        }
    }

    fn instance() -> InstanceId {
        InstanceId::new("run-1").unwrap()
    }

    fn step(s: &str) -> StepId {
        StepId::new(s).unwrap()
    }

    async fn logger_with_three() -> (Arc<EditableLog>, ExecutionLogger) {
        let log = Arc::new(EditableLog::default());
        let logger = ExecutionLogger::new(
            Arc::clone(&log) as Arc<dyn LogStore>,
            Arc::new(MemoryKvStore::new()),
        )
        .unwrap();
        for name in ["start", "review", "publish"] {
            logger
                .append_next(&instance(), TokenId::new(), step(name))
                .await
                .unwrap();
        }
        (log, logger)
    }

    fn rewrite(record: &mut LogRecord, f: impl FnOnce(&mut ExecutionLogEntry)) {
        let mut entry: ExecutionLogEntry = serde_json::from_slice(&record.data).unwrap();
        f(&mut entry);
        record.data = serde_json::to_vec(&entry).unwrap();
    }

    #[tokio::test]
    async fn test_append_links_entries() {
        let logger = ExecutionLogger::new(
            Arc::new(MemoryLogStore::new()),
            Arc::new(MemoryKvStore::new()),
        )
        .unwrap();
        let first = logger
            .append(LogEntryInput {
                instance_id: instance(),
                sequence_no: 1,
                token_id: TokenId::new(),
                step_id: step("start"),
            })
            .await
            .unwrap();
        assert!(first.prev_entry_hash.is_zero());
        let second = logger
            .append_next(&instance(), TokenId::new(), step("review"))
            .await
            .unwrap();
        assert_eq!(second.sequence_no, 2);
        assert_eq!(second.prev_entry_hash, first.entry_hash);
        assert_eq!(logger.entries(&instance()).await.unwrap(), vec![first, second.clone()]);
        assert_eq!(logger.tip(&instance()).await.unwrap(), Some(second));
        assert_eq!(logger.instances().await.unwrap(), vec![instance()]);
        logger.verify_chain(&instance()).await.unwrap();
    }

    #[tokio::test]
    async fn test_sequence_gap_rejected() {
        let (_, logger) = logger_with_three().await;
        for bad in [3, 5] {
            let err = logger
                .append(LogEntryInput {
                    instance_id: instance(),
                    sequence_no: bad,
                    token_id: TokenId::new(),
                    step_id: step("x"),
                })
                .await
                .unwrap_err();
            assert_eq!(
                err,
                LogError::SequenceGap {
                    instance_id: instance(),
                    expected: 4,
                    actual: bad,
                }
            );
        }
        assert_eq!(logger.next_sequence(&instance()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_altered_hash_detected() {
        let (log, logger) = logger_with_three().await;
        log.edit("exec:run-1", |records| {
            rewrite(&mut records[1], |e| e.entry_hash = ContentHash::hash(b"forged"));
        });
        let report = logger.verify_report(&instance()).await.unwrap();
        assert!(report.contains(&LogIssue::HashMismatch { sequence_no: 2 }));
        assert!(report.contains(&LogIssue::BrokenLink { sequence_no: 3 }));
        assert!(matches!(
            logger.verify_chain(&instance()).await,
            Err(LogError::TamperedLog { sequence_no: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_rewritten_step_detected() {
        let (log, logger) = logger_with_three().await;
        log.edit("exec:run-1", |records| {
            rewrite(&mut records[0], |e| e.step_id = step("publish"));
        });
        assert!(matches!(
            logger.verify_chain(&instance()).await,
            Err(LogError::TamperedLog { sequence_no: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_deleted_entry_detected() {
        let (log, logger) = logger_with_three().await;
        log.edit("exec:run-1", |records| {
            records.remove(1);
        });
        assert!(matches!(
            logger.verify_chain(&instance()).await,
            Err(LogError::TamperedLog { .. })
        ));
    }

    #[tokio::test]
    async fn test_truncated_tail_detected() {
        let (log, logger) = logger_with_three().await;
        log.edit("exec:run-1", |records| {
            records.pop();
        });
        let report = logger.verify_report(&instance()).await.unwrap();
        assert_eq!(
            report,
            vec![LogIssue::AnchorMismatch {
                anchored: 3,
                present: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_append_refuses_tampered_tip() {
        let (log, logger) = logger_with_three().await;
        log.edit("exec:run-1", |records| {
            rewrite(&mut records[2], |e| e.step_id = step("forged"));
        });
        assert!(matches!(
            logger.append_next(&instance(), TokenId::new(), step("next")).await,
            Err(LogError::TamperedLog { sequence_no: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_audit_entries_checks_exported_log() {
        let (_, logger) = logger_with_three().await;
        let entries = logger.entries(&instance()).await.unwrap();
        let tip = LogAnchor {
            sequence_no: 3,
            entry_hash: entries[2].entry_hash,
        };
        assert!(audit_entries(&entries, Some(tip)).is_empty());
        assert!(audit_entries(&[], None).is_empty());

        let mut edited = entries.clone();
        edited[1].step_id = step("publish");
        assert_eq!(
            audit_entries(&edited, None),
            vec![LogIssue::HashMismatch { sequence_no: 2 }]
        );

        let truncated = &entries[..2];
        assert!(audit_entries(truncated, None).is_empty());
        assert_eq!(
            audit_entries(truncated, Some(tip)),
            vec![LogIssue::AnchorMismatch {
                anchored: 3,
                present: 2,
            }]
        );
    }
}

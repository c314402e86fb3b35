//! A-JWT Storage - injected persistence for the trust protocol.
//!
//! Two storage shapes back every stateful component:
//!
//! # Key-value ([`KvStore`])
//!
//! Namespaced byte values with atomic `insert_new` and `compare_and_swap`.
//! Holds agent records, workflow definitions, and consumed-token marks.
//!
//! # Append-only log ([`LogStore`])
//!
//! Named streams of records with a strict `last + 1` sequence guarantee.
//! Holds execution logs and per-agent registration history.
//!
//! Both traits ship with in-memory implementations for tests and single
//! process deployments. Durable backends implement the same traits and are
//! handed to the components at construction; no component opens storage on
//! its own.
//!
//! [`KeyedLocks`] provides the per-key serialization that components layer
//! on top of the stores.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;
pub mod locks;
pub mod log;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};
pub use locks::{KeyGuard, KeyedLocks};
pub use log::{LogRecord, LogStore, MemoryLogStore, next_sequence, validate_stream};

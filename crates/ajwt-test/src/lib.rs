//! A-JWT Test - shared test utilities for the trust protocol crates.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! ajwt-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use ajwt_test::{ManualClock, TestAgent};
//!
//! let clock = ManualClock::shared();
//! let worker = TestAgent::new("worker");
//! let proof = worker.mint_proof(&ajwt_test::test_context(), clock.now());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod clock;
pub mod fixtures;
pub mod stores;

pub use clock::*;
pub use fixtures::*;
pub use stores::*;

/// Install a test-writer subscriber honoring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

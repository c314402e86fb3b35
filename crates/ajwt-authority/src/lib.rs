//! A-JWT Authority - the trust protocol's components wired together.
//!
//! An [`Authority`] owns one agent registry, delegation engine, workflow
//! registry, token engine, and execution logger, all over the same injected
//! [`Backends`]. It adds the checks that need more than one component:
//!
//! - a mint request's claimed predecessor must be the last step logged for
//!   the instance;
//! - an instance runs exactly one workflow;
//! - a presented token is consumed only together with its log entry.
//!
//! # Example
//!
//! ```rust,no_run
//! use ajwt_authority::{Authority, Backends};
//! use ajwt_config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolved = Config::load()?;
//! let authority = Authority::new(&resolved.config, Backends::in_memory())?;
//! println!("issuer key {}", authority.issuer_key().key_id_hex());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod authority;
mod error;
mod settings;

pub use authority::{Accepted, Authority, Backends, INSTANCES_NAMESPACE};
pub use error::{AuthorityError, AuthorityResult};

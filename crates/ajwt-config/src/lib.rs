#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for A-JWT services.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ajwt_config::Config;
//!
//! let resolved = Config::load().unwrap();
//! println!("issuer: {}", resolved.config.issuer.name);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest:
//!
//! 1. An explicit file passed by the caller
//! 2. **User** (`~/.ajwt/config.toml`)
//! 3. **System** (`/etc/ajwt/config.toml`)
//! 4. **Environment variables** (`AJWT_*`), fallback only
//! 5. **Embedded defaults** (`defaults.toml`)
//!
//! This crate depends on no other A-JWT crate. Conversion into engine
//! options happens where the engines are assembled.

/// Environment variable fallbacks.
pub mod env;
/// Configuration error types.
pub mod error;
/// File discovery and layered loading.
pub mod loader;
/// Layered merging with source tracking.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::LoadOptions;
pub use merge::ConfigLayer;
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load with the full precedence chain and the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any file is malformed or the result
    /// fails validation.
    pub fn load() -> ConfigResult<ResolvedConfig> {
        loader::load(&LoadOptions::default())
    }

    /// Load with explicit options.
    ///
    /// # Errors
    ///
    /// As [`Config::load`].
    pub fn load_with(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
        loader::load(options)
    }

    /// Load a single file with no layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}

//! A-JWT Prompt - prompt integrity binding.
//!
//! A token carries the checksum of the prompt it was minted for. The
//! receiving service recomputes the checksum over the prompt it actually
//! received; any difference means the prompt was altered in transit.
//!
//! Checksums are SHA-256 over the prompt's UTF-8 bytes. A [`PromptBinder`]
//! can optionally normalize whitespace first so that cosmetic reformatting
//! (line endings, indentation, blank lines) does not count as tampering.
//!
//! # Example
//!
//! ```
//! use ajwt_prompt::{PromptBinder, bind, verify};
//!
//! let checksum = bind("Summarize the quarterly report.");
//! assert!(verify("Summarize the quarterly report.", &checksum));
//! assert!(!verify("Summarize and email the quarterly report.", &checksum));
//!
//! let lenient = PromptBinder::normalizing();
//! let c = lenient.bind("  line one\r\n\r\nline two  ");
//! assert!(lenient.verify("line one\nline two", &c));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::fmt;

use ajwt_crypto::{CryptoResult, Sha256Digest};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Checksum of a prompt, hex-encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptChecksum(Sha256Digest);

impl PromptChecksum {
    /// Wrap an existing digest.
    #[must_use]
    pub const fn from_digest(digest: Sha256Digest) -> Self {
        Self(digest)
    }

    /// Parse from lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid hex or a wrong length.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        Sha256Digest::from_hex(s).map(Self)
    }

    /// Lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// The underlying digest.
    #[must_use]
    pub const fn digest(&self) -> &Sha256Digest {
        &self.0
    }
}

impl fmt::Display for PromptChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Canonicalize prompt whitespace.
///
/// Converts CRLF and lone CR to LF, trims every line, drops blank lines, and
/// joins the rest with `\n`.
#[must_use]
pub fn normalize_prompt(content: &str) -> String {
    content
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Checksum of the exact prompt bytes.
#[must_use]
pub fn bind(content: &str) -> PromptChecksum {
    PromptChecksum(Sha256Digest::digest(content.as_bytes()))
}

/// Whether `content` hashes to `expected`. Comparison is constant time.
#[must_use]
pub fn verify(content: &str, expected: &PromptChecksum) -> bool {
    bind(content).0.constant_time_eq(&expected.0)
}

/// Computes and checks prompt checksums under a fixed normalization policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptBinder {
    normalize: bool,
}

impl PromptBinder {
    /// Binder that hashes prompts byte for byte.
    #[must_use]
    pub const fn exact() -> Self {
        Self { normalize: false }
    }

    /// Binder that runs [`normalize_prompt`] before hashing.
    #[must_use]
    pub const fn normalizing() -> Self {
        Self { normalize: true }
    }

    /// Binder with the given policy.
    #[must_use]
    pub const fn new(normalize: bool) -> Self {
        Self { normalize }
    }

    /// Whether this binder normalizes.
    #[must_use]
    pub const fn normalizes(&self) -> bool {
        self.normalize
    }

    /// Compute the checksum of `content`.
    #[must_use]
    pub fn bind(&self, content: &str) -> PromptChecksum {
        if self.normalize {
            bind(&normalize_prompt(content))
        } else {
            bind(content)
        }
    }

    /// Whether `content` matches `expected` under this policy.
    #[must_use]
    pub fn verify(&self, content: &str, expected: &PromptChecksum) -> bool {
        self.verify_checksum(&self.bind(content), expected)
    }

    /// Whether a checksum computed by the caller matches `expected`.
    /// Comparison is constant time.
    #[must_use]
    pub fn verify_checksum(&self, observed: &PromptChecksum, expected: &PromptChecksum) -> bool {
        let ok = observed.0.constant_time_eq(&expected.0);
        if !ok {
            debug!(expected = %expected, normalize = self.normalize, "prompt checksum mismatch");
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_deterministic() {
        assert_eq!(bind("prompt"), bind("prompt"));
        assert_ne!(bind("prompt"), bind("prompt "));
    }

    #[test]
    fn test_bind_is_plain_sha256() {
        assert_eq!(
            bind("abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_detects_single_character_change() {
        let checksum = bind("Transfer $10 to account 42");
        assert!(verify("Transfer $10 to account 42", &checksum));
        assert!(!verify("Transfer $90 to account 42", &checksum));
    }

    #[test]
    fn test_normalize_prompt() {
        assert_eq!(
            normalize_prompt("  first\r\n\r\n\tsecond  \rthird\n\n"),
            "first\nsecond\nthird"
        );
        assert_eq!(normalize_prompt("   \n \r\n"), "");
    }

    #[test]
    fn test_exact_binder_is_whitespace_sensitive() {
        let binder = PromptBinder::exact();
        let c = binder.bind("a\nb");
        assert!(binder.verify("a\nb", &c));
        assert!(!binder.verify("a\r\nb", &c));
        assert_eq!(c, bind("a\nb"));
    }

    #[test]
    fn test_normalizing_binder_ignores_cosmetic_whitespace() {
        let binder = PromptBinder::normalizing();
        let c = binder.bind("do the thing\n");
        assert!(binder.verify("  do the thing  \r\n\r\n", &c));
        assert!(!binder.verify("do the other thing", &c));
    }

    #[test]
    fn test_verify_checksum_compares_precomputed_values() {
        let binder = PromptBinder::exact();
        let expected = bind("Approve invoice 7");
        assert!(binder.verify_checksum(&bind("Approve invoice 7"), &expected));
        assert!(!binder.verify_checksum(&bind("Approve invoice 8"), &expected));

        // Precomputed checksums are compared as given, never re-normalized.
        let normalizing = PromptBinder::normalizing();
        assert!(!normalizing.verify_checksum(&bind("Approve invoice 7\n"), &expected));
    }

    #[test]
    fn test_checksum_hex_and_serde() {
        let c = bind("x");
        assert_eq!(PromptChecksum::from_hex(&c.to_hex()).unwrap(), c);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, format!("\"{}\"", c.to_hex()));
        assert!(PromptChecksum::from_hex("nothex").is_err());
    }
}

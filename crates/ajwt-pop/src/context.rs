//! The request an agent proves possession for.

use std::fmt;

use ajwt_crypto::{CryptoResult, Sha256Digest};
use serde::{Deserialize, Serialize};

use crate::error::{ProofError, ProofResult};

/// Checksum of an agent's runtime artifact.
///
/// Bound at registration and re-presented, inside every possession proof,
/// by the agent. A checksum that differs from the registered one means the
/// agent's code changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentChecksum(Sha256Digest);

impl AgentChecksum {
    /// Checksum of raw artifact bytes.
    #[must_use]
    pub fn of_artifact(bytes: &[u8]) -> Self {
        Self(Sha256Digest::digest(bytes))
    }

    /// Wrap an existing digest.
    #[must_use]
    pub const fn from_digest(digest: Sha256Digest) -> Self {
        Self(digest)
    }

    /// Parse from hex.
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
}

impl fmt::Display for AgentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The ephemeral request a proof is bound to: method, URL, and body digest.
///
/// The verifier builds this from the request it actually received, never
/// from values supplied by the client, so a proof replayed against another
/// endpoint or body fails signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    method: String,
    url: String,
    body_digest: Sha256Digest,
}

impl RequestContext {
    /// Build from a raw request.
    ///
    /// The method is upper-cased; the URL is parsed, normalized, and has
    /// any fragment removed.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::InvalidContext`] for an empty or non-token
    /// method, or an unparseable URL.
    pub fn new(method: &str, url: &str, body: &[u8]) -> ProofResult<Self> {
        Self::with_body_digest(method, url, Sha256Digest::digest(body))
    }

    /// Build from a precomputed body digest.
    ///
    /// # Errors
    ///
    /// Same as [`RequestContext::new`].
    pub fn with_body_digest(
        method: &str,
        url: &str,
        body_digest: Sha256Digest,
    ) -> ProofResult<Self> {
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ProofError::InvalidContext(format!(
                "invalid method {method:?}"
            )));
        }
        let mut parsed =
            url::Url::parse(url).map_err(|e| ProofError::InvalidContext(e.to_string()))?;
        parsed.set_fragment(None);
        Ok(Self {
            method: method.to_ascii_uppercase(),
            url: parsed.into(),
            body_digest,
        })
    }

    /// Upper-case HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Normalized URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// SHA-256 of the request body.
    #[must_use]
    pub fn body_digest(&self) -> &Sha256Digest {
        &self.body_digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_method_and_url() {
        let ctx = RequestContext::new("post", "HTTPS://Api.Example.com/run#frag", b"{}").unwrap();
        assert_eq!(ctx.method(), "POST");
        assert_eq!(ctx.url(), "https://api.example.com/run");
        assert_eq!(ctx.body_digest(), &Sha256Digest::digest(b"{}"));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(RequestContext::new("", "https://x.test/", b"").is_err());
        assert!(RequestContext::new("GE T", "https://x.test/", b"").is_err());
        assert!(RequestContext::new("GET", "not a url", b"").is_err());
    }

    #[test]
    fn test_agent_checksum_hex() {
        let c = AgentChecksum::of_artifact(b"agent v1");
        assert_eq!(AgentChecksum::from_hex(&c.to_hex()).unwrap(), c);
        assert_ne!(c, AgentChecksum::of_artifact(b"agent v2"));
    }
}

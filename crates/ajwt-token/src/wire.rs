//! Compact token encoding.
//!
//! A token travels as three base64url segments joined by `.`:
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(signature)
//! ```
//!
//! The issuer signature does not cover the raw segment text directly. It
//! covers a versioned, length-prefixed encoding of the two segments so the
//! signed bytes can never be reinterpreted as another structure.

use ajwt_crypto::{
    ContentHash, DOMAIN_TOKEN, KeyPair, PublicKey, Signature, b64url_decode, b64url_encode,
};
use serde::{Deserialize, Serialize};

use crate::claims::{IntentClaims, IntentToken};
use crate::error::{TokenError, TokenResult};

/// Signature algorithm named in every header.
pub const TOKEN_ALG: &str = "EdDSA";

/// Token type named in every header.
pub const TOKEN_TYP: &str = "A-JWT";

/// Largest encoded token accepted for decoding.
pub const MAX_TOKEN_BYTES: usize = 64 * 1024;

const SIGNING_INPUT_VERSION: u8 = 0x01;

/// The token header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm.
    pub alg: String,
    /// Token type.
    pub typ: String,
    /// Key id of the issuer key.
    pub kid: String,
}

impl TokenHeader {
    /// Header for tokens signed by `issuer`.
    #[must_use]
    pub fn for_issuer(issuer: &PublicKey) -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
            kid: issuer.key_id_hex(),
        }
    }
}

/// Hash that possession proofs bind when presenting `encoded`.
#[must_use]
pub fn token_hash(encoded: &[u8]) -> ContentHash {
    ContentHash::hash_with_domain(DOMAIN_TOKEN, encoded)
}

/// Serialize and sign claims.
///
/// # Errors
///
/// Returns [`TokenError::Malformed`] if a segment cannot be serialized.
pub fn encode(issuer: &KeyPair, claims: IntentClaims) -> TokenResult<IntentToken> {
    let header = TokenHeader::for_issuer(&issuer.public_key());
    let header_b64 = b64url_encode(to_json(&header)?);
    let payload_b64 = b64url_encode(to_json(&claims)?);
    let signature = issuer.sign(&signing_input(&header_b64, &payload_b64));
    let encoded = format!("{header_b64}.{payload_b64}.{}", signature.to_base64url());
    Ok(IntentToken {
        header,
        claims,
        encoded,
    })
}

/// Decode and check the issuer signature.
///
/// # Errors
///
/// - [`TokenError::Malformed`] for bad framing or segment contents.
/// - [`TokenError::UnsupportedHeader`] for an unexpected `alg` or `typ`.
/// - [`TokenError::UnknownIssuerKey`] if `kid` is not `issuer`'s.
/// - [`TokenError::InvalidSignature`] if the signature does not verify.
pub fn decode(bytes: &[u8], issuer: &PublicKey) -> TokenResult<IntentToken> {
    let parts = split(bytes)?;
    let header = parse_header(parts.header)?;
    if header.kid != issuer.key_id_hex() {
        return Err(TokenError::UnknownIssuerKey { kid: header.kid });
    }
    let signature = Signature::from_base64url(parts.signature)
        .map_err(|e| TokenError::Malformed(format!("signature segment: {e}")))?;
    issuer
        .verify(&signing_input(parts.header, parts.payload), &signature)
        .map_err(|_| TokenError::InvalidSignature)?;
    let claims = parse_segment(parts.payload, "claims")?;
    Ok(IntentToken {
        header,
        claims,
        encoded: parts.whole.to_string(),
    })
}

/// Decode without checking the signature. For inspection only.
///
/// # Errors
///
/// [`TokenError::Malformed`] or [`TokenError::UnsupportedHeader`].
pub fn decode_unverified(bytes: &[u8]) -> TokenResult<IntentToken> {
    let parts = split(bytes)?;
    let header = parse_header(parts.header)?;
    let claims = parse_segment(parts.payload, "claims")?;
    Ok(IntentToken {
        header,
        claims,
        encoded: parts.whole.to_string(),
    })
}

/// The exact bytes the issuer signs.
#[allow(clippy::cast_possible_truncation)]
fn signing_input(header_b64: &str, payload_b64: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(
        header_b64
            .len()
            .saturating_add(payload_b64.len())
            .saturating_add(9),
    );
    data.push(SIGNING_INPUT_VERSION);
    for segment in [header_b64, payload_b64] {
        data.extend_from_slice(&(segment.len() as u32).to_le_bytes());
        data.extend_from_slice(segment.as_bytes());
    }
    data
}

struct Parts<'a> {
    whole: &'a str,
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

fn split(bytes: &[u8]) -> TokenResult<Parts<'_>> {
    if bytes.len() > MAX_TOKEN_BYTES {
        return Err(TokenError::Malformed(format!(
            "token is {} bytes, limit is {MAX_TOKEN_BYTES}",
            bytes.len()
        )));
    }
    let whole = std::str::from_utf8(bytes)
        .map_err(|_| TokenError::Malformed("token is not UTF-8".into()))?
        .trim();
    let mut segments = whole.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok(Parts {
                whole,
                header,
                payload,
                signature,
            })
        }
        _ => Err(TokenError::Malformed(
            "expected three non-empty segments".into(),
        )),
    }
}

fn parse_header(segment: &str) -> TokenResult<TokenHeader> {
    let header: TokenHeader = parse_segment(segment, "header")?;
    if header.alg != TOKEN_ALG {
        return Err(TokenError::UnsupportedHeader(format!(
            "alg {:?}",
            header.alg
        )));
    }
    if header.typ != TOKEN_TYP {
        return Err(TokenError::UnsupportedHeader(format!(
            "typ {:?}",
            header.typ
        )));
    }
    Ok(header)
}

fn parse_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> TokenResult<T> {
    let raw = b64url_decode(segment)
        .map_err(|e| TokenError::Malformed(format!("{what} segment: {e}")))?;
    serde_json::from_slice(&raw).map_err(|e| TokenError::Malformed(format!("{what}: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> TokenResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| TokenError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_input_is_length_prefixed() {
        // "ab" + "c" and "a" + "bc" must not collide.
        assert_ne!(signing_input("ab", "c"), signing_input("a", "bc"));
        let input = signing_input("h", "p");
        assert_eq!(input[0], SIGNING_INPUT_VERSION);
        assert_eq!(&input[1..5], &1u32.to_le_bytes());
    }

    #[test]
    fn test_split_rejects_bad_framing() {
        for bad in ["", "a.b", "a.b.c.d", "a..c", ".b.c"] {
            assert!(
                matches!(split(bad.as_bytes()), Err(TokenError::Malformed(_))),
                "{bad:?} accepted"
            );
        }
        assert!(split(b"a.b.c").is_ok());
    }

    #[test]
    fn test_oversized_token_rejected() {
        let big = vec![b'a'; MAX_TOKEN_BYTES.saturating_add(1)];
        assert!(matches!(split(&big), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_header_checks_alg_and_typ() {
        let key = KeyPair::generate().public_key();
        let mut header = TokenHeader::for_issuer(&key);
        let ok = b64url_encode(serde_json::to_vec(&header).unwrap());
        assert!(parse_header(&ok).is_ok());

        header.alg = "none".into();
        let bad = b64url_encode(serde_json::to_vec(&header).unwrap());
        assert!(matches!(
            parse_header(&bad),
            Err(TokenError::UnsupportedHeader(_))
        ));
    }

    #[test]
    fn test_token_hash_is_domain_separated() {
        assert_ne!(token_hash(b"x"), ContentHash::hash(b"x"));
        assert_eq!(token_hash(b"x"), token_hash(b"x"));
    }
}

//! URL-safe base64 without padding, as used by the token wire format.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{CryptoError, CryptoResult};

/// Encode bytes as unpadded base64url.
#[must_use]
pub fn b64url_encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded base64url.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidBase64Encoding`] on malformed input,
/// including padded input.
pub fn b64url_decode(s: &str) -> CryptoResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| CryptoError::InvalidBase64Encoding)
}

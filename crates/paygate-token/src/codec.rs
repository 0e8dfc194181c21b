//! Compact signed token codec: `B64URL(header).B64URL(payload).B64URL(sig)`.
//!
//! The header is fixed HS256/JWT; the payload is the canonical JSON of
//! [`TokenClaims`]; the signature is HMAC-SHA256 over the two concatenated
//! base64 segments. Emitted without base64 padding; padding is tolerated on
//! decode.

use base64::alphabet;
use base64::engine::{self, Engine as _};

use crate::claims::TokenClaims;
use crate::crypto::{constant_time_eq, hmac_sign};

/// URL-safe engine: no padding on encode, indifferent to padding on decode.
const B64: engine::GeneralPurpose = engine::GeneralPurpose::new(
    &alphabet::URL_SAFE,
    engine::GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(engine::DecodePaddingMode::Indifferent),
);

/// Fixed token header.
const HEADER_JSON: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

/// Errors from token generation.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("claims serialization failed")]
    Serialize(#[source] serde_json::Error),
}

/// Split into exactly three dot-separated segments.
///
/// Tokens with surrounding whitespace or a segment count other than three are
/// rejected here, before any cryptography runs.
fn segments(token: &str) -> Option<(&str, &str, &str)> {
    if token.is_empty() || token.trim() != token {
        return None;
    }
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(sig), None) => Some((header, payload, sig)),
        _ => None,
    }
}

/// Serialize, encode, and sign a claim set.
#[cfg(any(feature = "USE_ONLY_IN_EAPI", test))]
pub fn generate(claims: &TokenClaims, key: &[u8]) -> Result<String, CodecError> {
    let payload = serde_json::to_vec(claims).map_err(CodecError::Serialize)?;
    let message = format!("{}.{}", B64.encode(HEADER_JSON), B64.encode(payload));
    let sig = hmac_sign(message.as_bytes(), key);
    Ok(format!("{message}.{}", B64.encode(sig)))
}

/// Recompute the signature over `header.payload` and compare constant-time.
pub fn verify_signature(token: &str, key: &[u8]) -> bool {
    let Some((header, payload, sig)) = segments(token) else {
        return false;
    };
    let Ok(sig_bytes) = B64.decode(sig) else {
        return false;
    };
    // Signatures are computed over the unpadded segments; strip any padding a
    // lenient peer re-added so the recomputed message matches what was signed.
    let message = format!(
        "{}.{}",
        header.trim_end_matches('='),
        payload.trim_end_matches('=')
    );
    constant_time_eq(&hmac_sign(message.as_bytes(), key), &sig_bytes)
}

/// Decode the payload segment only. Callers must [`verify_signature`] first —
/// parsed claims are untrusted until the signature checks out.
pub fn parse(token: &str) -> Option<TokenClaims> {
    let (_, payload, _) = segments(token)?;
    let payload_bytes = B64.decode(payload).ok()?;
    serde_json::from_slice(&payload_bytes).ok()
}

//! Credential hashing and HMAC primitives.
//!
//! No plaintext secret material ever appears in return values, errors, or
//! logs; verification failures collapse to `false`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::RngExt;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Salt length prepended to stored credential hashes.
const SALT_LEN: usize = 16;

/// SHA-256 digest length.
const DIGEST_LEN: usize = 32;

/// Printable charset for generated secrets. Excludes `<`, `>`, quotes, and
/// backslash so generated values survive header sanitization unchanged.
const SECRET_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&*+-.:;=?@_~";

/// Hash a client secret for vault storage: `base64(salt || SHA-256(salt || secret))`.
pub fn hash_credential(secret: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::rng().random();

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();

    let mut stored = Vec::with_capacity(SALT_LEN + DIGEST_LEN);
    stored.extend_from_slice(&salt);
    stored.extend_from_slice(digest.as_slice());
    STANDARD.encode(stored)
}

/// Verify a presented secret against a stored hash.
///
/// Returns `false` on any decode or shape failure — never an error, so a
/// corrupt vault record reads as a plain mismatch.
pub fn verify_credential(secret: &str, stored: &str) -> bool {
    let Ok(decoded) = STANDARD.decode(stored) else {
        return false;
    };
    if decoded.len() != SALT_LEN + DIGEST_LEN {
        return false;
    }
    let (salt, digest) = decoded.split_at(SALT_LEN);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    constant_time_eq(hasher.finalize().as_slice(), digest)
}

/// HMAC-SHA256 over `data`.
pub fn hmac_sign(data: &[u8], key: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().as_slice().to_vec()
}

/// Generate a cryptographically secure random string over [`SECRET_CHARSET`].
pub fn secure_random_string(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| SECRET_CHARSET[rng.random_range(0..SECRET_CHARSET.len())] as char)
        .collect()
}

/// Constant-time byte equality. Length mismatch reads as unequal without
/// short-circuiting on content.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

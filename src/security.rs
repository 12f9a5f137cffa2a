//! Salted password digests plus the entropy helpers shared with the session layer.
//!
//! A stored credential has the shape `<salt>$<digest>`, where `digest` is the
//! lowercase hex SHA-256 of `password || salt`. There is no key stretching here;
//! the format is kept deliberately simple and fully deterministic for a given salt.

use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Separates salt from digest in a stored credential. Never valid inside a salt.
pub const SEPARATOR: char = '$';

const SALT_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("salt must not contain the reserved '$' separator")]
    ReservedSeparator,
}

/// Fill `buf` from the OS entropy source.
///
/// # Panics
/// When the OS source is unavailable. Tokens and salts must never be built from
/// predictable bytes, and `Uuid::new_v4` has the same failure mode.
pub(crate) fn fill_random(buf: &mut [u8]) {
    if let Err(e) = getrandom::getrandom(buf) {
        tracing::error!(target: "tessera::security", "getrandom failed: {}", e);
        panic!("OS entropy source unavailable: {e}");
    }
}

/// Random opaque token, base64url without padding.
pub(crate) fn random_token(len: usize) -> String {
    let mut buf = vec![0u8; len];
    fill_random(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Fresh salt: 16 random bytes as lowercase hex, so it can never contain the separator.
pub fn generate_salt() -> String {
    let mut buf = [0u8; SALT_BYTES];
    fill_random(&mut buf);
    hex::encode(buf)
}

fn digest_hex(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash `password` under a freshly generated salt.
pub fn hash_password(password: &str) -> String {
    let salt = generate_salt();
    let digest = digest_hex(password, &salt);
    format!("{salt}{SEPARATOR}{digest}")
}

/// Hash `password` under a caller-supplied salt.
pub fn hash_password_with_salt(password: &str, salt: &str) -> Result<String, HashError> {
    if salt.contains(SEPARATOR) {
        return Err(HashError::ReservedSeparator);
    }
    let digest = digest_hex(password, salt);
    Ok(format!("{salt}{SEPARATOR}{digest}"))
}

/// Check `password` against a stored `<salt>$<digest>` value.
/// Anything that does not split into exactly two parts is rejected.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split(SEPARATOR);
    let (Some(salt), Some(expected), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let actual = digest_hex(password, salt);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn stored_form_is_salt_and_lowercase_hex_digest() {
        let stored = hash_password("pw");
        let (salt, digest) = stored.split_once(SEPARATOR).unwrap();
        assert_eq!(salt.len(), SALT_BYTES * 2);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn explicit_salt_is_deterministic() {
        let a = hash_password_with_salt("pw", "abc").unwrap();
        let b = hash_password_with_salt("pw", "abc").unwrap();
        assert_eq!(a, b);
        // sha256("pwabc")
        assert_eq!(a, format!("abc${}", hex::encode(Sha256::digest(b"pwabc"))));
        assert!(verify_password("pw", &a));
    }

    #[test]
    fn salts_differ_between_calls() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn reserved_separator_in_salt_is_rejected() {
        assert_eq!(hash_password_with_salt("pw", "a$b"), Err(HashError::ReservedSeparator));
    }

    #[test]
    fn malformed_stored_values_fail_closed() {
        assert!(!verify_password("x", "not-well-formed"));
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "a$b$c"));
        let good = hash_password_with_salt("x", "s").unwrap();
        assert!(!verify_password("x", &format!("{good}$")));
    }

    #[test]
    fn fill_random_overwrites_the_buffer() {
        let mut buf = [0u8; 64];
        fill_random(&mut buf);
        assert!(buf.iter().any(|b| *b != 0));
    }

    #[test]
    fn random_tokens_are_url_safe() {
        let t = random_token(32);
        assert_eq!(t.len(), 43);
        assert!(t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(t, random_token(32));
    }
}

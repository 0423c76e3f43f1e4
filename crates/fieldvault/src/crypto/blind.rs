//! Deterministic keyed blind-index hashing for equality search.
//!
//! ```text
//! HMAC-SHA256(blind-index subkey, u64_be(len(scope)) ‖ scope ‖ lowercase(cleartext))
//! ```
//!
//! The scope is length-prefixed so `("ab", "c")` and `("a", "bc")` can never
//! collide. Output is lowercase hex, always [`DIGEST_HEX_LEN`] characters.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::cipher::CipherError;

type HmacSha256 = Hmac<Sha256>;

/// Width of a blind-index column value in characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the blind index of `cleartext` under `scope`.
///
/// `cleartext` is case-folded before hashing, so `"Hello"` and `"hello"`
/// produce the same digest.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if HMAC rejects `key`.
pub fn blind_digest(key: &[u8], cleartext: &str, scope: &str) -> Result<String, CipherError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?;
    mac.update(&(scope.len() as u64).to_be_bytes());
    mac.update(scope.as_bytes());
    mac.update(cleartext.to_lowercase().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

//! Root secret handling and HKDF-SHA256 subkey derivation.
//!
//! ```text
//! HKDF-SHA256(
//!     ikm  = root secret,
//!     salt = "fieldvault:hkdf-salt:v1",
//!     info = "encryption" | "blind-index"
//! )
//! ```
//!
//! The raw root secret is never used as a key directly.

use hkdf::Hkdf;
use sha2::Sha256;

use super::cipher::{CipherError, KEY_LEN};

/// Minimum accepted root secret length in bytes.
pub const MIN_ROOT_SECRET_LEN: usize = 32;

/// HKDF salt shared by every derivation.
pub const HKDF_SALT: &[u8] = b"fieldvault:hkdf-salt:v1";

/// HKDF info label for the AEAD subkey.
pub const LABEL_ENCRYPTION: &[u8] = b"encryption";

/// HKDF info label for the blind-index HMAC subkey.
pub const LABEL_BLIND_INDEX: &[u8] = b"blind-index";

/// Root secret bytes as supplied by configuration.
///
/// Zeroed on drop and never printed.
pub struct RootSecret(Vec<u8>);

impl RootSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if the secret is shorter than
    /// [`MIN_ROOT_SECRET_LEN`].
    pub fn new(bytes: Vec<u8>) -> Result<Self, CipherError> {
        if bytes.len() < MIN_ROOT_SECRET_LEN {
            let mut bytes = bytes;
            bytes.iter_mut().for_each(|b| *b = 0);
            return Err(CipherError::InvalidKeyLength);
        }
        Ok(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for RootSecret {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RootSecret([REDACTED])")
    }
}

/// Fixed-size derived key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// When this type is dropped, the memory is overwritten with zeroes.
pub struct SubKey(Box<[u8; KEY_LEN]>);

impl SubKey {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Drop for SubKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SubKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("SubKey([REDACTED])")
    }
}

/// Derive a 256-bit subkey from `root` under the given domain-separation `label`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if HKDF expansion fails.
pub fn derive_subkey(root: &RootSecret, label: &[u8]) -> Result<SubKey, CipherError> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), root.as_bytes());
    let mut okm = Box::new([0u8; KEY_LEN]);
    hk.expand(label, &mut okm[..])
        .map_err(|_| CipherError::InvalidKeyLength)?;
    Ok(SubKey(okm))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(byte: u8) -> RootSecret {
        RootSecret::new(vec![byte; MIN_ROOT_SECRET_LEN]).unwrap()
    }

    #[test]
    fn short_root_secret_rejected() {
        assert_eq!(
            RootSecret::new(vec![0x42; 16]).unwrap_err(),
            CipherError::InvalidKeyLength
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_subkey(&root(0x42), LABEL_ENCRYPTION).unwrap();
        let b = derive_subkey(&root(0x42), LABEL_ENCRYPTION).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn labels_separate_domains() {
        let secret = root(0x42);
        let enc = derive_subkey(&secret, LABEL_ENCRYPTION).unwrap();
        let blind = derive_subkey(&secret, LABEL_BLIND_INDEX).unwrap();
        assert_ne!(enc.as_bytes(), blind.as_bytes());
        assert_ne!(enc.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn different_roots_different_keys() {
        let a = derive_subkey(&root(0x01), LABEL_BLIND_INDEX).unwrap();
        let b = derive_subkey(&root(0x02), LABEL_BLIND_INDEX).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn key_material_redacted_in_debug() {
        let secret = root(0xFF);
        let key = derive_subkey(&secret, LABEL_ENCRYPTION).unwrap();
        assert!(format!("{secret:?}").contains("REDACTED"));
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}

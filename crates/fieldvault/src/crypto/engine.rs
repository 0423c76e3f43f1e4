//! [`CipherEngine`]: the scalar encrypt / decrypt / blind-hash surface.

use super::blind::blind_digest;
use super::cipher::{decrypt_field, encrypt_field, CipherError, Envelope};
use super::kdf::{derive_subkey, RootSecret, SubKey, LABEL_BLIND_INDEX, LABEL_ENCRYPTION};

/// Holds the two subkeys derived from the root secret.
///
/// Immutable after construction and performs no I/O, so one engine can be
/// shared across threads behind an `Arc`.
pub struct CipherEngine {
    encryption_key: SubKey,
    blind_index_key: SubKey,
}

impl CipherEngine {
    /// Derive the encryption and blind-index subkeys from `root`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if derivation fails.
    pub fn new(root: &RootSecret) -> Result<Self, CipherError> {
        Ok(Self {
            encryption_key: derive_subkey(root, LABEL_ENCRYPTION)?,
            blind_index_key: derive_subkey(root, LABEL_BLIND_INDEX)?,
        })
    }

    /// Encrypt `plaintext` bound to `identity` and return the envelope string.
    ///
    /// Every call draws a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encryption`] on an internal AEAD error.
    pub fn encrypt_scalar(&self, plaintext: &str, identity: &str) -> Result<String, CipherError> {
        let envelope = encrypt_field(
            plaintext.as_bytes(),
            self.encryption_key.as_bytes(),
            identity.as_bytes(),
        )?;
        Ok(envelope.to_string_repr())
    }

    /// Decrypt an envelope string bound to `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decryption`] for every failure cause: malformed
    /// encoding, unknown version, failed authentication, or non-UTF-8 output.
    pub fn decrypt_scalar(&self, envelope: &str, identity: &str) -> Result<String, CipherError> {
        let parsed = Envelope::parse(envelope)?;
        let bytes = decrypt_field(
            &parsed,
            self.encryption_key.as_bytes(),
            identity.as_bytes(),
        )?;
        String::from_utf8(bytes).map_err(|_| CipherError::Decryption)
    }

    /// Compute the blind index of `cleartext` under `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if the subkey is rejected by HMAC.
    pub fn blind_hash(&self, cleartext: &str, scope: &str) -> Result<String, CipherError> {
        blind_digest(self.blind_index_key.as_bytes(), cleartext, scope)
    }
}

impl std::fmt::Debug for CipherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherEngine")
            .field("encryption_key", &self.encryption_key)
            .field("blind_index_key", &self.blind_index_key)
            .finish()
    }
}

//! AES-256-GCM-SIV encryption and decryption of individual string fields.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant.
//! A fresh random nonce is still drawn for every call, so identical plaintext
//! and identity produce different envelopes.
//!
//! The record identity is passed as associated data: an envelope copied onto a
//! different record fails authentication.

use aes_gcm_siv::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the AES-GCM-SIV authentication tag.
pub const TAG_LEN: usize = 16;

/// Envelope version produced by [`encrypt_field`].
pub const CURRENT_VERSION: u32 = 1;

/// Suffix that marks a stored value as an envelope rather than cleartext.
pub const ENVELOPE_MARKER: &str = "<ENC>";

/// Returns `true` if `value` carries the envelope marker.
///
/// This is the only signal used to tell "needs decrypt" apart from
/// "already cleartext".
pub fn is_envelope(value: &str) -> bool {
    value.ends_with(ENVELOPE_MARKER)
}

/// A parsed, encrypted field value.
///
/// The string representation is `<version>:<base64url(nonce ‖ ciphertext ‖ tag)><ENC>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Envelope format version.
    pub version: u32,
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode this value to its canonical string representation.
    pub fn to_string_repr(&self) -> String {
        let mut body = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        body.extend_from_slice(&self.nonce);
        body.extend_from_slice(&self.ciphertext);
        format!(
            "{}:{}{}",
            self.version,
            URL_SAFE_NO_PAD.encode(body),
            ENVELOPE_MARKER,
        )
    }

    /// Parse an envelope string back into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decryption`] if the marker is missing, the
    /// version is unknown, or the payload is not valid base64url of the
    /// expected minimum length.
    pub fn parse(s: &str) -> Result<Self, CipherError> {
        let unmarked = s
            .strip_suffix(ENVELOPE_MARKER)
            .ok_or(CipherError::Decryption)?;
        let (version, payload) = unmarked.split_once(':').ok_or(CipherError::Decryption)?;
        let version: u32 = version.parse().map_err(|_| CipherError::Decryption)?;
        match version {
            1 => Self::parse_v1(payload),
            _ => Err(CipherError::Decryption),
        }
    }

    fn parse_v1(payload: &str) -> Result<Self, CipherError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CipherError::Decryption)?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Decryption);
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        Ok(Self {
            version: 1,
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// A key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM-SIV encryption failed.
    #[error("aead encryption failed")]
    Encryption,

    /// The envelope could not be parsed or authenticated.
    ///
    /// Format, version and tag failures share this single variant.
    #[error("decryption failed")]
    Decryption,
}

/// Encrypt a plaintext field bound to `aad`.
///
/// A random 96-bit nonce is generated per call via the OS CSPRNG.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::Encryption`] on an internal AEAD error.
pub fn encrypt_field(plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<Envelope, CipherError> {
    let cipher = build_cipher(key)?;

    use aes_gcm_siv::aead::rand_core::RngCore;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CipherError::Encryption)?;

    Ok(Envelope {
        version: CURRENT_VERSION,
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt an [`Envelope`] bound to `aad` back to plaintext bytes.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::Decryption`] if authentication fails (wrong key,
/// wrong associated data, or tampered data).
pub fn decrypt_field(envelope: &Envelope, key: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(&envelope.nonce);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: envelope.ciphertext.as_ref(),
                aad,
            },
        )
        .map_err(|_| CipherError::Decryption)
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> Vec<u8> {
        use aes_gcm_siv::aead::rand_core::RngCore;
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = random_key();
        let encrypted = encrypt_field(b"123-45-6789", &key, b"user-1").unwrap();
        let decrypted = decrypt_field(&encrypted, &key, b"user-1").unwrap();
        assert_eq!(decrypted, b"123-45-6789");
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let encrypted = encrypt_field(b"secret", &random_key(), b"user-1").unwrap();
        assert_eq!(
            decrypt_field(&encrypted, &random_key(), b"user-1"),
            Err(CipherError::Decryption)
        );
    }

    #[test]
    fn wrong_aad_fails_decryption() {
        let key = random_key();
        let encrypted = encrypt_field(b"secret", &key, b"user-1").unwrap();
        assert_eq!(
            decrypt_field(&encrypted, &key, b"user-2"),
            Err(CipherError::Decryption)
        );
    }

    #[test]
    fn invalid_key_length_rejected() {
        let short_key = vec![0u8; 16];
        assert_eq!(
            encrypt_field(b"x", &short_key, b"").unwrap_err(),
            CipherError::InvalidKeyLength
        );
    }

    #[test]
    fn string_repr_is_marked_and_parses() {
        let key = random_key();
        let field = encrypt_field(b"hello", &key, b"id").unwrap();
        let s = field.to_string_repr();
        assert!(s.starts_with("1:"));
        assert!(is_envelope(&s));
        assert_eq!(Envelope::parse(&s).unwrap(), field);
    }

    #[test]
    fn parse_rejects_missing_marker() {
        assert!(Envelope::parse("1:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").is_err());
    }

    #[test]
    fn parse_rejects_unknown_version() {
        let key = random_key();
        let s = encrypt_field(b"hello", &key, b"id").unwrap().to_string_repr();
        let v9 = format!("9{}", &s[1..]);
        assert_eq!(Envelope::parse(&v9), Err(CipherError::Decryption));
    }

    #[test]
    fn parse_rejects_bad_base64() {
        assert!(Envelope::parse("1:!!!<ENC>").is_err());
    }

    #[test]
    fn parse_rejects_short_payload() {
        let short = format!("1:{}<ENC>", URL_SAFE_NO_PAD.encode([0u8; NONCE_LEN]));
        assert!(Envelope::parse(&short).is_err());
    }

    #[test]
    fn cleartext_is_not_an_envelope() {
        assert!(!is_envelope("+33612345678"));
        assert!(!is_envelope(""));
    }
}

//! Cipher Engine: subkey derivation, field encryption, and blind indexing.
//!
//! This module is intentionally free of schema and lifecycle dependencies.
//! It provides the low-level operations used by the lifecycle coordinator.
//!
//! # Envelope format
//!
//! ```text
//! <version>:<base64url-no-pad(nonce ‖ ciphertext ‖ tag)><ENC>
//! ```
//!
//! The decimal version enables future algorithm or key-version migration
//! without breaking existing ciphertext. The `<ENC>` suffix is the marker the
//! storage boundary relies on.

pub mod blind;
pub mod cipher;
pub mod engine;
pub mod kdf;

pub use cipher::{is_envelope, CipherError, ENVELOPE_MARKER, KEY_LEN};
pub use engine::CipherEngine;
pub use kdf::RootSecret;

//! Common error types shared across crates.

use thiserror::Error;

/// Top-level error type surfaced to the host storage layer.
///
/// Variants map to stable machine-readable codes via [`VaultError::code`]:
/// - [`VaultError::Configuration`] → `configuration_error`
/// - [`VaultError::Decryption`] → `decryption_failure`
/// - [`VaultError::Encryption`] → `encryption_failure`
/// - [`VaultError::Classification`] → `classification_error`
#[derive(Debug, Error)]
pub enum VaultError {
    /// The root secret or another startup setting is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stored envelope could not be authenticated or decoded.
    ///
    /// Wrong key, wrong identity, unknown version and corrupted bytes are
    /// deliberately indistinguishable.
    #[error("decryption failure on {record_type}.{field}")]
    Decryption {
        /// Record type the envelope belongs to.
        record_type: String,
        /// Field holding the envelope.
        field: String,
    },

    /// A field could not be encrypted; the write must not proceed.
    #[error("encryption failure: {0}")]
    Encryption(String),

    /// A record type declaration is invalid or unknown.
    #[error("classification error: {0}")]
    Classification(String),
}

impl VaultError {
    /// Returns the machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Configuration(_) => "configuration_error",
            VaultError::Decryption { .. } => "decryption_failure",
            VaultError::Encryption(_) => "encryption_failure",
            VaultError::Classification(_) => "classification_error",
        }
    }

    /// Returns `true` if the error means stored data cannot be trusted.
    ///
    /// Such errors abort the triggering operation and are never retried.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, VaultError::Decryption { .. })
    }
}

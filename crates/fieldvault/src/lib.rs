//! `fieldvault`: transparent field-level encryption for persisted records.
//!
//! A host storage layer calls the four [`Coordinator`] entry points at its
//! lifecycle boundaries; application code only ever sees cleartext while the
//! storage boundary only ever sees envelopes and blind indexes.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Optionally install the tracing subscriber ([`telemetry::init_tracing`]).
//! 3. Call [`init`] to derive subkeys, load and validate record schemas, and
//!    obtain a [`Coordinator`].
//! 4. Open one [`UnitOfWork`] per transaction or session.

pub mod config;
pub mod crypto;
mod error;
pub mod lifecycle;
pub mod schema;
pub mod storage;
pub mod telemetry;

use std::{path::Path, sync::Arc};

use tracing::info;

pub use config::{Config, ConfigError};
pub use crypto::{CipherEngine, CipherError, RootSecret};
pub use fieldvault_common::{Document, Encryptable, FieldValue, VaultError};
pub use lifecycle::{ChangeSetHost, Coordinator, RecordState, UnitOfWork};
pub use schema::{ClassificationError, Classifier, FieldClassification, FieldKind, RecordSchema};
pub use storage::{MemoryStore, Session};

/// Build a [`Coordinator`] from validated configuration.
///
/// The root secret is only held for the duration of subkey derivation.
///
/// # Errors
///
/// [`VaultError::Configuration`] for a missing or malformed root secret, or
/// [`VaultError::Classification`] if the schema file is unreadable or any
/// declaration is invalid.
pub fn init(cfg: &Config) -> Result<Coordinator, VaultError> {
    let engine = {
        let root = cfg.root_secret()?;
        CipherEngine::new(&root).map_err(|e| VaultError::Configuration(e.to_string()))?
    };

    let classifier = Classifier::new();
    if let Some(path) = &cfg.schema_path {
        schema::load_file(Path::new(path), &classifier)?;
    }
    let validated = classifier.validate_all()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        schemas = validated,
        "fieldvault initialised"
    );
    Ok(Coordinator::new(Arc::new(engine), Arc::new(classifier)))
}

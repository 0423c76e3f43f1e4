//! Record contract, generic document type, and errors shared across `fieldvault` crates.

pub mod error;
pub mod record;

pub use error::VaultError;
pub use record::{Document, Encryptable, FieldValue};

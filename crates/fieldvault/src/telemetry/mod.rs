//! Structured logging setup.
//!
//! # Telemetry invariants
//!
//! - **No cleartext, ciphertext or key material** must appear in any span
//!   attribute or log field. Record types, field names and unit-of-work ids
//!   are the only identifying data logged.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::init_tracing;

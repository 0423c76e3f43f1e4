//! Reference storage host.
//!
//! [`MemoryStore`] shows how a storage layer drives the four lifecycle phases:
//! rows hold what would be on disk (envelopes and blind indexes), while every
//! [`Document`](fieldvault_common::Document) handed to callers is cleartext.

pub mod memory;

pub use memory::{MemoryStore, Session};

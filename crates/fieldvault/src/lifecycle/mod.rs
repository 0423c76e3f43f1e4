//! Lifecycle Coordinator: encryption driven by storage persistence phases.
//!
//! # Phases
//!
//! 1. **Materialize** after a read: envelopes become cleartext.
//! 2. **Pre-write** before the write set is computed: blind indexes are
//!    recomputed and cleartext becomes envelopes.
//! 3. **Post-write** after the write: cleartext is restored.
//! 4. **Cache-invalidate**: the Decrypt Cache of the unit of work is emptied.
//!
//! Application code only ever observes cleartext; envelopes exist only at the
//! storage boundary between pre-write and post-write.
//!
//! # Module invariants
//!
//! - Cleartext, envelopes and key material never appear in log fields.
//! - A [`UnitOfWork`] is never shared between concurrent units of work.

pub mod cache;
pub mod coordinator;
pub mod unit;

pub use cache::{CacheKey, DecryptCache};
pub use coordinator::{ChangeSetHost, Coordinator, RecordState};
pub use unit::UnitOfWork;

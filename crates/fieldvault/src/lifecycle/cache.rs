//! Per-unit-of-work Decrypt Cache.
//!
//! Maps `(record type, identity, field)` to the last cleartext/envelope pair
//! seen for that field. A pre-write whose cleartext still matches reuses the
//! envelope verbatim; a restore whose stored value still matches the envelope
//! skips decryption.

use std::collections::HashMap;

/// Cache key: one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    record_type: String,
    identity: String,
    field: String,
}

impl CacheKey {
    pub fn new(record_type: &str, identity: &str, field: &str) -> Self {
        Self {
            record_type: record_type.to_owned(),
            identity: identity.to_owned(),
            field: field.to_owned(),
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    cleartext: String,
    envelope: String,
}

/// Ephemeral cleartext/envelope pairs owned by exactly one unit of work.
#[derive(Default)]
pub struct DecryptCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl DecryptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Envelope previously paired with `cleartext`, if it is still current.
    pub fn envelope_for(&self, key: &CacheKey, cleartext: &str) -> Option<&str> {
        self.entries
            .get(key)
            .filter(|e| e.cleartext == cleartext)
            .map(|e| e.envelope.as_str())
    }

    /// Cleartext previously paired with `envelope`, if it is still current.
    pub fn cleartext_for(&self, key: &CacheKey, envelope: &str) -> Option<&str> {
        self.entries
            .get(key)
            .filter(|e| e.envelope == envelope)
            .map(|e| e.cleartext.as_str())
    }

    /// Record the current pair for `key`, replacing any older one.
    pub fn insert(&mut self, key: CacheKey, cleartext: String, envelope: String) {
        self.entries.insert(key, CacheEntry { cleartext, envelope });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// Entries hold cleartext; never print them.
impl std::fmt::Debug for DecryptCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

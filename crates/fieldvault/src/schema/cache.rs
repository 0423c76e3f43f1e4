//! In-memory cache of field classifications, keyed by record type name.
//!
//! Classifications are computed lazily on first use and never change after.
//! The cache uses `arc-swap` for lock-free reads on the hot path; writers
//! publish a new map with read-copy-update. Two threads racing to classify the
//! same type both succeed and store equal values.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;

use super::classifier::FieldClassification;

/// Shared, lock-free cache of classifications and has-any-encrypted guards.
#[derive(Clone, Debug)]
pub struct ClassificationCache {
    classifications: Arc<ArcSwap<HashMap<String, Arc<FieldClassification>>>>,
    guards: Arc<ArcSwap<HashMap<String, bool>>>,
}

impl ClassificationCache {
    /// Create a new, empty [`ClassificationCache`].
    pub fn new() -> Self {
        Self {
            classifications: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            guards: Arc::new(ArcSwap::from_pointee(HashMap::new())),
        }
    }

    /// Return the number of classified record types.
    pub fn len(&self) -> usize {
        self.classifications.load().len()
    }

    /// Return `true` if nothing has been classified yet.
    pub fn is_empty(&self) -> bool {
        self.classifications.load().is_empty()
    }

    /// Look up a classification. Lock-free.
    pub fn get(&self, record_type: &str) -> Option<Arc<FieldClassification>> {
        self.classifications.load().get(record_type).cloned()
    }

    /// Publish a classification for `record_type`.
    pub fn insert(&self, record_type: &str, classification: Arc<FieldClassification>) {
        self.classifications.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(record_type.to_owned(), Arc::clone(&classification));
            next
        });
    }

    /// Look up the cached has-any-encrypted guard for `record_type`.
    pub fn guard(&self, record_type: &str) -> Option<bool> {
        self.guards.load().get(record_type).copied()
    }

    /// Publish the has-any-encrypted guard for `record_type`.
    pub fn insert_guard(&self, record_type: &str, protects: bool) {
        self.guards.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(record_type.to_owned(), protects);
            next
        });
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new()
    }
}

//! [`MemoryStore`]: an in-memory storage host driving the lifecycle phases.

use std::{collections::HashMap, sync::Arc};

use fieldvault_common::{Document, Encryptable, VaultError};
use parking_lot::RwLock;
use tracing::debug;

use crate::lifecycle::{ChangeSetHost, Coordinator, RecordState, UnitOfWork};

type RowKey = (String, String);

/// Rows keyed by `(record type, identity)`, holding storage-boundary values.
///
/// Cheaply cloneable; clones share the same rows.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<HashMap<RowKey, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// The row exactly as stored: envelopes and blind indexes, no cleartext.
    pub fn raw(&self, record_type: &str, identity: &str) -> Option<Document> {
        self.rows
            .read()
            .get(&(record_type.to_owned(), identity.to_owned()))
            .cloned()
    }

    /// Open a session. Each session owns its own [`UnitOfWork`].
    pub fn session<'a>(&'a self, coordinator: &'a Coordinator) -> Session<'a> {
        Session {
            store: self,
            coordinator,
            uow: UnitOfWork::begin(),
            changes: PendingChanges::default(),
        }
    }
}

#[derive(Debug, Default)]
struct PendingChanges {
    recomputed: Vec<RowKey>,
}

impl ChangeSetHost for PendingChanges {
    fn recompute_change_set(&mut self, record_type: &str, identity: &str) {
        self.recomputed
            .push((record_type.to_owned(), identity.to_owned()));
    }
}

/// One unit of work against a [`MemoryStore`].
///
/// Loads and writes in the same session share a Decrypt Cache, so writing a
/// loaded record back unchanged stores byte-identical envelopes.
pub struct Session<'a> {
    store: &'a MemoryStore,
    coordinator: &'a Coordinator,
    uow: UnitOfWork,
    changes: PendingChanges,
}

impl Session<'_> {
    /// Load and materialize one record.
    ///
    /// # Errors
    ///
    /// [`VaultError::Decryption`] if a stored envelope fails to decrypt.
    pub fn load(&mut self, record_type: &str, identity: &str) -> Result<Option<Document>, VaultError> {
        let Some(mut doc) = self.store.raw(record_type, identity) else {
            return Ok(None);
        };
        self.coordinator.on_materialize(&mut doc, &mut self.uow)?;
        Ok(Some(doc))
    }

    /// Equality lookup through a blind index column.
    ///
    /// An empty candidate matches nothing.
    ///
    /// # Errors
    ///
    /// [`VaultError::Classification`] if `index_field` is not a blind index,
    /// or [`VaultError::Decryption`] if a matching row fails to decrypt.
    pub fn find_by_blind_index(
        &mut self,
        record_type: &str,
        index_field: &str,
        candidate: &str,
    ) -> Result<Vec<Document>, VaultError> {
        let Some(digest) = self
            .coordinator
            .blind_index_for(record_type, index_field, candidate)?
        else {
            return Ok(Vec::new());
        };
        let mut matches: Vec<Document> = self
            .store
            .rows
            .read()
            .values()
            .filter(|d| d.record_type() == record_type && d.text(index_field) == Some(digest.as_str()))
            .cloned()
            .collect();
        for doc in &mut matches {
            self.coordinator.on_materialize(doc, &mut self.uow)?;
        }
        debug!(record_type, index_field, matches = matches.len(), "blind index lookup");
        Ok(matches)
    }

    /// Insert or update `doc`, leaving it in cleartext afterwards.
    ///
    /// # Errors
    ///
    /// Any pre-write error; in that case nothing is stored.
    pub fn persist(&mut self, doc: &mut Document) -> Result<(), VaultError> {
        let key = (doc.record_type().to_owned(), doc.identity().to_owned());
        let state = if self.store.rows.read().contains_key(&key) {
            RecordState::Managed
        } else {
            RecordState::New
        };
        self.coordinator
            .on_pre_write(doc, state, &mut self.uow, &mut self.changes)?;
        self.store.rows.write().insert(key, doc.clone());
        self.coordinator.on_post_write(doc, &mut self.uow)
    }

    /// Host cache-invalidate signal.
    pub fn clear(&mut self) {
        self.coordinator.on_cache_invalidate(&mut self.uow);
    }

    /// Records whose pending change set was recomputed during pre-write.
    pub fn recomputed_change_sets(&self) -> &[(String, String)] {
        &self.changes.recomputed
    }

    pub fn close(self) {
        self.uow.finish();
    }

    pub fn abort(self) {
        self.uow.abort();
    }
}

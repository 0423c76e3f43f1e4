//! [`Coordinator`]: drives encryption and decryption from storage lifecycle phases.
//!
//! Every phase first builds an immutable [`Plan`] over the whole reachable
//! record graph and applies it only if planning succeeded. A failing decrypt
//! or encrypt therefore leaves the record exactly as it was.

use std::sync::Arc;

use fieldvault_common::{Encryptable, VaultError};
use tracing::{debug, debug_span, error, warn};

use super::cache::{CacheKey, DecryptCache};
use super::unit::UnitOfWork;
use crate::crypto::{is_envelope, CipherEngine};
use crate::schema::{ClassificationError, Classifier, FieldKind};

/// Whether the storage layer is inserting a record or updating a tracked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Not yet persisted; the host computes its write set after pre-write.
    New,
    /// Already tracked; the host must recompute its pending change set if
    /// pre-write rewrites any field.
    Managed,
}

/// Callback surface the host storage layer implements.
#[cfg_attr(test, mockall::automock)]
pub trait ChangeSetHost {
    /// Recompute the pending change set of a tracked record whose fields were
    /// rewritten during pre-write.
    fn recompute_change_set(&mut self, record_type: &str, identity: &str);
}

struct FieldUpdate {
    field: String,
    value: Option<String>,
    /// `(key, cleartext, envelope)` to record once the update is applied.
    seed: Option<(CacheKey, String, String)>,
}

#[derive(Default)]
struct Plan {
    updates: Vec<FieldUpdate>,
    embedded: Vec<(String, Plan)>,
    cache_hits: usize,
}

impl Plan {
    fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.embedded.is_empty()
    }

    fn cache_hits(&self) -> usize {
        self.cache_hits + self.embedded.iter().map(|(_, p)| p.cache_hits()).sum::<usize>()
    }

    /// Apply to `record`, seeding `cache`. Returns the number of fields written.
    fn apply(self, record: &mut dyn Encryptable, cache: &mut DecryptCache) -> usize {
        let mut written = 0;
        for update in self.updates {
            if let Some((key, cleartext, envelope)) = update.seed {
                cache.insert(key, cleartext, envelope);
            }
            record.set_text(&update.field, update.value);
            written += 1;
        }
        for (field, child) in self.embedded {
            if let Some(embedded) = record.embedded_mut(&field) {
                written += child.apply(embedded, cache);
            }
        }
        written
    }
}

/// Lifecycle Coordinator.
///
/// Stateless apart from shared, immutable collaborators; all per-pass state
/// lives in the [`UnitOfWork`] passed to each entry point.
#[derive(Debug, Clone)]
pub struct Coordinator {
    engine: Arc<CipherEngine>,
    classifier: Arc<Classifier>,
}

impl Coordinator {
    pub fn new(engine: Arc<CipherEngine>, classifier: Arc<Classifier>) -> Self {
        Self { engine, classifier }
    }

    pub fn engine(&self) -> &CipherEngine {
        &self.engine
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Materialize phase: decrypt every stored envelope into cleartext.
    ///
    /// Unmarked legacy values are left as they are and get encrypted on the
    /// next write.
    ///
    /// # Errors
    ///
    /// [`VaultError::Decryption`] if any envelope fails to decrypt; the record
    /// is left untouched and the load must be abandoned.
    pub fn on_materialize(
        &self,
        record: &mut dyn Encryptable,
        uow: &mut UnitOfWork,
    ) -> Result<(), VaultError> {
        let span = debug_span!(
            "materialize",
            record_type = record.record_type(),
            unit_of_work = %uow.id()
        );
        let _enter = span.enter();
        self.restore(record, uow)
    }

    /// Pre-write phase: recompute blind indexes, then encrypt cleartext fields.
    ///
    /// Cleartext that still matches the Decrypt Cache reuses its cached
    /// envelope, so an untouched value is persisted byte-identical.
    ///
    /// # Errors
    ///
    /// [`VaultError::Encryption`], [`VaultError::Decryption`] (a blind index
    /// target that is still an envelope could not be read) or
    /// [`VaultError::Classification`]. On error nothing has been modified.
    pub fn on_pre_write(
        &self,
        record: &mut dyn Encryptable,
        state: RecordState,
        uow: &mut UnitOfWork,
        host: &mut dyn ChangeSetHost,
    ) -> Result<(), VaultError> {
        let span = debug_span!(
            "pre_write",
            record_type = record.record_type(),
            unit_of_work = %uow.id()
        );
        let _enter = span.enter();

        let plan = self
            .plan_write(&*record, record.record_type(), uow.cache())
            .map_err(|e| {
            warn!(code = e.code(), "pre-write aborted; record left untouched");
            e
        })?;
        let cache_hits = plan.cache_hits();
        let written = plan.apply(record, uow.cache_mut());

        if written > 0 && state == RecordState::Managed {
            host.recompute_change_set(record.record_type(), record.identity());
        }
        debug!(written, cache_hits, ?state, "pre-write applied");
        Ok(())
    }

    /// Post-write phase: restore cleartext so callers never observe ciphertext.
    ///
    /// The pairs restored here are kept in the Decrypt Cache so writing the
    /// record again unchanged reuses the same envelopes.
    ///
    /// # Errors
    ///
    /// [`VaultError::Decryption`] if an envelope fails to decrypt.
    pub fn on_post_write(
        &self,
        record: &mut dyn Encryptable,
        uow: &mut UnitOfWork,
    ) -> Result<(), VaultError> {
        let span = debug_span!(
            "post_write",
            record_type = record.record_type(),
            unit_of_work = %uow.id()
        );
        let _enter = span.enter();
        self.restore(record, uow)
    }

    /// Cache-invalidate phase: drop every Decrypt Cache entry.
    pub fn on_cache_invalidate(&self, uow: &mut UnitOfWork) {
        let dropped = uow.cache().len();
        uow.cache_mut().clear();
        debug!(unit_of_work = %uow.id(), dropped, "decrypt cache invalidated");
    }

    /// Digest to compare against `index_field` when looking up `candidate`.
    ///
    /// Returns `None` for an empty candidate, matching the "never hash an
    /// absent value" rule applied on write.
    ///
    /// # Errors
    ///
    /// [`VaultError::Classification`] if `index_field` is not a blind index of
    /// `record_type`.
    pub fn blind_index_for(
        &self,
        record_type: &str,
        index_field: &str,
        candidate: &str,
    ) -> Result<Option<String>, VaultError> {
        let classification = self.classifier.classify(record_type)?;
        let Some(FieldKind::BlindIndexOf { scope, .. }) = classification.kind(index_field) else {
            return Err(ClassificationError::NotABlindIndex {
                record_type: record_type.to_owned(),
                field: index_field.to_owned(),
            }
            .into());
        };
        if candidate.is_empty() {
            return Ok(None);
        }
        let digest = self
            .engine
            .blind_hash(candidate, scope)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        Ok(Some(digest))
    }

    fn restore(&self, record: &mut dyn Encryptable, uow: &mut UnitOfWork) -> Result<(), VaultError> {
        let plan = self.plan_restore(&*record, record.record_type(), uow.cache())?;
        let cache_hits = plan.cache_hits();
        let written = plan.apply(record, uow.cache_mut());
        debug!(written, cache_hits, "cleartext restored");
        Ok(())
    }

    /// `record_type` is the type the record is classified as: its own type at
    /// the root, the declared type for embedded records.
    fn plan_restore(
        &self,
        record: &dyn Encryptable,
        record_type: &str,
        cache: &DecryptCache,
    ) -> Result<Plan, VaultError> {
        let mut plan = Plan::default();
        if !self.classifier.has_any_encrypted_field(record_type)? {
            return Ok(plan);
        }
        let classification = self.classifier.classify(record_type)?;
        let identity = record.identity();

        for field in classification.encrypted_fields() {
            let Some(stored) = record.text(field) else {
                continue;
            };
            if !is_envelope(stored) {
                continue;
            }
            let key = CacheKey::new(record_type, identity, field);
            let cleartext = match cache.cleartext_for(&key, stored) {
                Some(hit) => {
                    plan.cache_hits += 1;
                    hit.to_owned()
                }
                None => self.decrypt(record_type, identity, field, stored)?,
            };
            plan.updates.push(FieldUpdate {
                field: field.to_owned(),
                value: Some(cleartext.clone()),
                seed: Some((key, cleartext, stored.to_owned())),
            });
        }

        for (field, declared) in classification.embedded_fields() {
            if let Some(child) = record.embedded(field) {
                check_embedded_type(record_type, field, declared, child)?;
                let sub = self.plan_restore(child, declared, cache)?;
                if !sub.is_empty() {
                    plan.embedded.push((field.to_owned(), sub));
                }
            }
        }
        Ok(plan)
    }

    fn plan_write(
        &self,
        record: &dyn Encryptable,
        record_type: &str,
        cache: &DecryptCache,
    ) -> Result<Plan, VaultError> {
        let mut plan = Plan::default();
        if !self.classifier.has_any_encrypted_field(record_type)? {
            return Ok(plan);
        }
        let classification = self.classifier.classify(record_type)?;
        let identity = record.identity();

        // Blind indexes are derived from the target's current cleartext and
        // overwrite whatever the caller left in the index field.
        for (index_field, target, scope) in classification.blind_indexes() {
            let cleartext = match record.text(target) {
                Some(value) if is_envelope(value) => {
                    let key = CacheKey::new(record_type, identity, target);
                    match cache.cleartext_for(&key, value) {
                        Some(hit) => hit.to_owned(),
                        None => self.decrypt(record_type, identity, target, value)?,
                    }
                }
                Some(value) => value.to_owned(),
                None => String::new(),
            };
            let digest = if cleartext.is_empty() {
                None
            } else {
                Some(self.engine.blind_hash(&cleartext, scope).map_err(|e| {
                    VaultError::Encryption(format!("{record_type}.{index_field}: {e}"))
                })?)
            };
            if record.text(index_field) != digest.as_deref() {
                plan.updates.push(FieldUpdate {
                    field: index_field.to_owned(),
                    value: digest,
                    seed: None,
                });
            }
        }

        for field in classification.encrypted_fields() {
            let Some(cleartext) = record.text(field) else {
                continue;
            };
            let key = CacheKey::new(record_type, identity, field);
            if is_envelope(cleartext) {
                // Stored form is only kept if it decrypts under this identity.
                if cache.cleartext_for(&key, cleartext).is_none() {
                    self.decrypt(record_type, identity, field, cleartext)?;
                }
                continue;
            }
            let envelope = match cache.envelope_for(&key, cleartext) {
                Some(hit) => {
                    plan.cache_hits += 1;
                    hit.to_owned()
                }
                None => self
                    .engine
                    .encrypt_scalar(cleartext, identity)
                    .map_err(|e| VaultError::Encryption(format!("{record_type}.{field}: {e}")))?,
            };
            plan.updates.push(FieldUpdate {
                field: field.to_owned(),
                value: Some(envelope.clone()),
                seed: Some((key, cleartext.to_owned(), envelope)),
            });
        }

        for (field, declared) in classification.embedded_fields() {
            if let Some(child) = record.embedded(field) {
                check_embedded_type(record_type, field, declared, child)?;
                let sub = self.plan_write(child, declared, cache)?;
                if !sub.is_empty() {
                    plan.embedded.push((field.to_owned(), sub));
                }
            }
        }
        Ok(plan)
    }

    fn decrypt(
        &self,
        record_type: &str,
        identity: &str,
        field: &str,
        envelope: &str,
    ) -> Result<String, VaultError> {
        self.engine.decrypt_scalar(envelope, identity).map_err(|_| {
            error!(record_type, field, "envelope failed to decrypt");
            VaultError::Decryption {
                record_type: record_type.to_owned(),
                field: field.to_owned(),
            }
        })
    }
}

fn check_embedded_type(
    record_type: &str,
    field: &str,
    declared: &str,
    child: &dyn Encryptable,
) -> Result<(), ClassificationError> {
    if child.record_type() == declared {
        return Ok(());
    }
    warn!(record_type, field, declared, found = child.record_type(), "embedded type mismatch");
    Err(ClassificationError::EmbeddedTypeMismatch {
        record_type: record_type.to_owned(),
        field: field.to_owned(),
        expected: declared.to_owned(),
        found: child.record_type().to_owned(),
    })
}

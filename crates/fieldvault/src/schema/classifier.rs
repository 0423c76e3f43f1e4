//! Field Classifier: resolves declared schemas into per-type field classifications.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::debug;

use super::cache::ClassificationCache;
use super::declaration::{FieldMarker, RecordSchema};

/// Errors raised while registering or classifying record types.
///
/// These are programmer errors in schema declarations and are reported as
/// soon as the offending type is classified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// No schema is registered under this name.
    #[error("unknown record type: {0}")]
    UnknownType(String),

    /// A schema with this name is already registered.
    #[error("record type {0} is already registered")]
    DuplicateType(String),

    /// Following `extends` leads back to a type already visited.
    #[error("{record_type}: inheritance cycle through {parent}")]
    InheritanceCycle { record_type: String, parent: String },

    #[error("{record_type}.{field}: blind index target `{target}` does not exist")]
    MissingBlindIndexTarget {
        record_type: String,
        field: String,
        target: String,
    },

    #[error("{record_type}.{field}: blind index target `{target}` is not an encrypted field")]
    BlindIndexTargetNotEncrypted {
        record_type: String,
        field: String,
        target: String,
    },

    #[error("{record_type}.{field}: unknown embedded type `{schema}`")]
    UnknownEmbeddedType {
        record_type: String,
        field: String,
        schema: String,
    },

    #[error("{record_type}.{field} is not a blind index")]
    NotABlindIndex { record_type: String, field: String },

    /// An embedded record does not carry the type its field declares.
    #[error("{record_type}.{field}: expected embedded `{expected}`, found `{found}`")]
    EmbeddedTypeMismatch {
        record_type: String,
        field: String,
        expected: String,
        found: String,
    },

    /// A schema document could not be read or parsed.
    #[error("invalid schema document: {0}")]
    InvalidDocument(String),
}

/// Resolved kind of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Plain,
    Encrypted,
    /// Blind index over `target`, hashed under `scope`.
    BlindIndexOf { target: String, scope: String },
    /// Embedded record of type `record_type`.
    Embedded { record_type: String },
}

/// Field name → [`FieldKind`] for one record type, inherited fields included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldClassification {
    record_type: String,
    fields: BTreeMap<String, FieldKind>,
}

impl FieldClassification {
    pub fn new(record_type: impl Into<String>, fields: BTreeMap<String, FieldKind>) -> Self {
        Self {
            record_type: record_type.into(),
            fields,
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Kind of `field`, or `None` if the type does not declare it.
    pub fn kind(&self, field: &str) -> Option<&FieldKind> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of directly encrypted fields.
    pub fn encrypted_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|(name, kind)| match kind {
            FieldKind::Encrypted => Some(name.as_str()),
            _ => None,
        })
    }

    /// `(index field, target field, scope)` triples.
    pub fn blind_indexes(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.fields.iter().filter_map(|(name, kind)| match kind {
            FieldKind::BlindIndexOf { target, scope } => {
                Some((name.as_str(), target.as_str(), scope.as_str()))
            }
            _ => None,
        })
    }

    /// `(field, embedded record type)` pairs.
    pub fn embedded_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|(name, kind)| match kind {
            FieldKind::Embedded { record_type } => Some((name.as_str(), record_type.as_str())),
            _ => None,
        })
    }

    /// Returns `true` if this type itself declares an encrypted field.
    pub fn has_encrypted_fields(&self) -> bool {
        self.encrypted_fields().next().is_some()
    }
}

/// Registry of declared schemas plus the lazily built classification cache.
///
/// Safe to share across threads; all reads are lock-free.
#[derive(Debug)]
pub struct Classifier {
    declarations: ArcSwap<HashMap<String, Arc<RecordSchema>>>,
    cache: ClassificationCache,
}

impl Classifier {
    /// Create an empty classifier.
    pub fn new() -> Self {
        Self {
            declarations: ArcSwap::from_pointee(HashMap::new()),
            cache: ClassificationCache::new(),
        }
    }

    /// Register a record type declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ClassificationError::DuplicateType`] if the name is taken.
    /// Classifications are immutable once built, so re-registration is refused.
    pub fn register(&self, schema: RecordSchema) -> Result<(), ClassificationError> {
        let name = schema.name.clone();
        let entry = Arc::new(schema);
        let mut duplicate = false;
        self.declarations.rcu(|current| {
            let mut next = HashMap::clone(current);
            duplicate = next.contains_key(&name);
            if !duplicate {
                next.insert(name.clone(), Arc::clone(&entry));
            }
            next
        });
        if duplicate {
            return Err(ClassificationError::DuplicateType(name));
        }
        debug!(record_type = %name, "registered record schema");
        Ok(())
    }

    /// Register several declarations, stopping at the first error.
    pub fn register_all(
        &self,
        schemas: impl IntoIterator<Item = RecordSchema>,
    ) -> Result<usize, ClassificationError> {
        let mut count = 0;
        for schema in schemas {
            self.register(schema)?;
            count += 1;
        }
        Ok(count)
    }

    /// Number of registered declarations.
    pub fn registered(&self) -> usize {
        self.declarations.load().len()
    }

    /// Classify `record_type`, building and caching the result on first use.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassificationError`] if the type, a parent, or an embedded
    /// type is unknown, if inheritance is cyclic, or if a blind index names a
    /// missing or non-encrypted target.
    pub fn classify(&self, record_type: &str) -> Result<Arc<FieldClassification>, ClassificationError> {
        if let Some(hit) = self.cache.get(record_type) {
            return Ok(hit);
        }
        let built = Arc::new(self.build(record_type)?);
        debug!(record_type, fields = built.len(), "classified record type");
        self.cache.insert(record_type, Arc::clone(&built));
        Ok(built)
    }

    /// Returns `true` if `record_type` or any record reachable through its
    /// embedded fields has an encrypted field.
    pub fn has_any_encrypted_field(&self, record_type: &str) -> Result<bool, ClassificationError> {
        if let Some(protects) = self.cache.guard(record_type) {
            return Ok(protects);
        }
        let mut visiting = HashSet::new();
        let protects = self.reaches_encrypted(record_type, &mut visiting)?;
        self.cache.insert_guard(record_type, protects);
        Ok(protects)
    }

    /// Classify every registered type so declaration errors surface at startup.
    pub fn validate_all(&self) -> Result<usize, ClassificationError> {
        let names: Vec<String> = self.declarations.load().keys().cloned().collect();
        for name in &names {
            self.classify(name)?;
        }
        Ok(names.len())
    }

    fn reaches_encrypted(
        &self,
        record_type: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<bool, ClassificationError> {
        if !visiting.insert(record_type.to_owned()) {
            return Ok(false);
        }
        let classification = self.classify(record_type)?;
        if classification.has_encrypted_fields() {
            return Ok(true);
        }
        for (_, child) in classification.embedded_fields() {
            if self.reaches_encrypted(child, visiting)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn build(&self, record_type: &str) -> Result<FieldClassification, ClassificationError> {
        let declarations = self.declarations.load();

        // Walk `extends` up to the root, most-derived first.
        let mut chain: Vec<Arc<RecordSchema>> = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(record_type.to_owned());
        while let Some(name) = current {
            if !seen.insert(name.clone()) {
                return Err(ClassificationError::InheritanceCycle {
                    record_type: record_type.to_owned(),
                    parent: name,
                });
            }
            let schema = declarations
                .get(&name)
                .cloned()
                .ok_or(ClassificationError::UnknownType(name))?;
            current = schema.extends.clone();
            chain.push(schema);
        }

        // Apply root-first so the most-derived declaration wins.
        let mut fields = BTreeMap::new();
        for schema in chain.iter().rev() {
            for decl in &schema.fields {
                let kind = match &decl.marker {
                    FieldMarker::Plain => FieldKind::Plain,
                    FieldMarker::Encrypted => FieldKind::Encrypted,
                    FieldMarker::BlindIndex { target, scope } => FieldKind::BlindIndexOf {
                        target: target.clone(),
                        scope: scope
                            .clone()
                            .unwrap_or_else(|| format!("{}.{}", schema.name, target)),
                    },
                    FieldMarker::Embedded { schema: child } => FieldKind::Embedded {
                        record_type: child.clone(),
                    },
                };
                fields.insert(decl.name.clone(), kind);
            }
        }

        for (field, kind) in &fields {
            match kind {
                FieldKind::BlindIndexOf { target, .. } => match fields.get(target) {
                    Some(FieldKind::Encrypted) => {}
                    Some(_) => {
                        return Err(ClassificationError::BlindIndexTargetNotEncrypted {
                            record_type: record_type.to_owned(),
                            field: field.clone(),
                            target: target.clone(),
                        })
                    }
                    None => {
                        return Err(ClassificationError::MissingBlindIndexTarget {
                            record_type: record_type.to_owned(),
                            field: field.clone(),
                            target: target.clone(),
                        })
                    }
                },
                FieldKind::Embedded { record_type: child } if !declarations.contains_key(child) => {
                    return Err(ClassificationError::UnknownEmbeddedType {
                        record_type: record_type.to_owned(),
                        field: field.clone(),
                        schema: child.clone(),
                    });
                }
                _ => {}
            }
        }

        Ok(FieldClassification::new(record_type, fields))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

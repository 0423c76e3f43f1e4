//! The Encryptable Record contract and a generic map-backed record.
//!
//! Host storage layers either implement [`Encryptable`] on their own types or
//! persist [`Document`]s directly. Field access is by name; which fields are
//! encrypted, blind indexes, or embedded records is decided by the declarative
//! schema, never by the record itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A persisted record whose fields may be encrypted at the storage boundary.
///
/// `identity` is bound into every ciphertext as associated data, so it must
/// never change once assigned.
pub trait Encryptable {
    /// Name of the record type, used to look up its field classification.
    fn record_type(&self) -> &str;

    /// Stable opaque identity of this record.
    fn identity(&self) -> &str;

    /// Optional surrogate numeric key used for storage-layer bookkeeping.
    fn surrogate_key(&self) -> Option<i64> {
        None
    }

    /// Current value of a text field, or `None` when absent or null.
    fn text(&self, field: &str) -> Option<&str>;

    /// Overwrite a text field. `None` stores null.
    fn set_text(&mut self, field: &str, value: Option<String>);

    /// Borrow an embedded record by field name.
    fn embedded(&self, field: &str) -> Option<&dyn Encryptable>;

    /// Mutably borrow an embedded record by field name.
    fn embedded_mut(&mut self, field: &str) -> Option<&mut dyn Encryptable>;
}

// ---------------------------------------------------------------------------
// Generic document
// ---------------------------------------------------------------------------

/// A single field value inside a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A nullable text column.
    Text(Option<String>),
    /// An embedded record stored inline with its parent.
    Embedded(Box<Document>),
}

/// A record held as a map of named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    record_type: String,
    identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    surrogate_key: Option<i64>,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Create an empty document with an explicit identity.
    pub fn new(record_type: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            identity: identity.into(),
            surrogate_key: None,
            fields: BTreeMap::new(),
        }
    }

    /// Create an empty document with a freshly generated UUID v4 identity.
    pub fn with_generated_identity(record_type: impl Into<String>) -> Self {
        Self::new(record_type, Uuid::new_v4().to_string())
    }

    /// Builder-style setter for a text field.
    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldValue::Text(Some(value.into())));
        self
    }

    /// Builder-style setter for an embedded record.
    pub fn with_embedded(mut self, field: impl Into<String>, doc: Document) -> Self {
        self.fields
            .insert(field.into(), FieldValue::Embedded(Box::new(doc)));
        self
    }

    /// Assign the storage-layer surrogate key.
    pub fn set_surrogate_key(&mut self, key: i64) {
        self.surrogate_key = Some(key);
    }

    /// Borrow the raw field map.
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Borrow an embedded document by field name.
    pub fn embedded_document(&self, field: &str) -> Option<&Document> {
        match self.fields.get(field) {
            Some(FieldValue::Embedded(doc)) => Some(&**doc),
            _ => None,
        }
    }

    /// Mutably borrow an embedded document by field name.
    pub fn embedded_document_mut(&mut self, field: &str) -> Option<&mut Document> {
        match self.fields.get_mut(field) {
            Some(FieldValue::Embedded(doc)) => Some(&mut **doc),
            _ => None,
        }
    }
}

impl Encryptable for Document {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn surrogate_key(&self) -> Option<i64> {
        self.surrogate_key
    }

    fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Text(Some(s))) => Some(s.as_str()),
            _ => None,
        }
    }

    fn set_text(&mut self, field: &str, value: Option<String>) {
        self.fields.insert(field.to_owned(), FieldValue::Text(value));
    }

    fn embedded(&self, field: &str) -> Option<&dyn Encryptable> {
        self.embedded_document(field).map(|d| d as &dyn Encryptable)
    }

    fn embedded_mut(&mut self, field: &str) -> Option<&mut dyn Encryptable> {
        self.embedded_document_mut(field)
            .map(|d| d as &mut dyn Encryptable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_access_and_null() {
        let mut doc = Document::new("Contact", "c-1").with_text("phone", "+33612345678");
        assert_eq!(doc.text("phone"), Some("+33612345678"));
        doc.set_text("phone", None);
        assert_eq!(doc.text("phone"), None);
        assert_eq!(doc.text("missing"), None);
        assert_eq!(doc.surrogate_key(), None);
        doc.set_surrogate_key(7);
        assert_eq!(doc.surrogate_key(), Some(7));
    }

    #[test]
    fn embedded_access() {
        let address = Document::new("Address", "a-1").with_text("street", "1 rue de Paris");
        let mut doc = Document::new("Contact", "c-1").with_embedded("address", address);
        assert_eq!(
            doc.embedded("address").and_then(|a| a.text("street")),
            Some("1 rue de Paris")
        );
        doc.embedded_mut("address")
            .unwrap()
            .set_text("street", Some("2 rue de Lyon".into()));
        assert_eq!(
            doc.embedded_document("address").unwrap().text("street"),
            Some("2 rue de Lyon")
        );
        assert!(doc.embedded("missing").is_none());
        assert!(Document::new("Contact", "c-2")
            .with_text("address", "inline")
            .embedded("address")
            .is_none());
    }

    #[test]
    fn generated_identities_differ() {
        let a = Document::with_generated_identity("Contact");
        let b = Document::with_generated_identity("Contact");
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn json_shape_of_nested_document() {
        let json = r#"{
            "record_type": "Contact",
            "identity": "c-1",
            "fields": {
                "phone": "+33612345678",
                "nickname": null,
                "address": {"record_type": "Address", "identity": "a-1", "fields": {}}
            }
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.text("phone"), Some("+33612345678"));
        assert_eq!(doc.fields().get("nickname"), Some(&FieldValue::Text(None)));
        assert_eq!(doc.embedded("address").unwrap().identity(), "a-1");
    }
}

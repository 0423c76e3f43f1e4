//! Declarative per-type field schemas.
//!
//! A [`RecordSchema`] replaces field annotations: it lists every field of one
//! record type together with its marker. Schemas are built in code or parsed
//! from YAML / JSON, e.g.
//!
//! ```yaml
//! - name: Contact
//!   extends: Party
//!   fields:
//!     - name: phone
//!       kind: encrypted
//!     - name: phone_index
//!       kind: blind_index
//!       target: phone
//!     - name: address
//!       kind: embedded
//!       schema: Address
//! ```

use serde::{Deserialize, Serialize};

/// Marker attached to one declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldMarker {
    /// Stored as-is.
    Plain,
    /// Encrypted at the storage boundary.
    Encrypted,
    /// Keyed hash of the `target` field's cleartext.
    BlindIndex {
        /// Name of the encrypted field this index is derived from.
        target: String,
        /// Hash scope override. Defaults to `<declaring type>.<target>`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
    /// An embedded record of another declared type.
    Embedded {
        /// Name of the embedded record type.
        schema: String,
    },
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name as seen by [`fieldvault_common::Encryptable`] accessors.
    pub name: String,
    /// Field marker.
    #[serde(flatten)]
    pub marker: FieldMarker,
}

/// Declaration of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Record type name, matched against [`fieldvault_common::Encryptable::record_type`].
    pub name: String,
    /// Parent type whose fields are inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Fields declared directly on this type.
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl RecordSchema {
    /// Start a declaration for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            fields: Vec::new(),
        }
    }

    /// Inherit the fields of `parent`.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn plain(self, field: impl Into<String>) -> Self {
        self.field(field, FieldMarker::Plain)
    }

    pub fn encrypted(self, field: impl Into<String>) -> Self {
        self.field(field, FieldMarker::Encrypted)
    }

    pub fn blind_index(self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.field(
            field,
            FieldMarker::BlindIndex {
                target: target.into(),
                scope: None,
            },
        )
    }

    /// Declare a blind index with an explicit hash scope.
    pub fn scoped_blind_index(
        self,
        field: impl Into<String>,
        target: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        self.field(
            field,
            FieldMarker::BlindIndex {
                target: target.into(),
                scope: Some(scope.into()),
            },
        )
    }

    pub fn embedded(self, field: impl Into<String>, schema: impl Into<String>) -> Self {
        self.field(
            field,
            FieldMarker::Embedded {
                schema: schema.into(),
            },
        )
    }

    fn field(mut self, name: impl Into<String>, marker: FieldMarker) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            marker,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_fields_in_order() {
        let schema = RecordSchema::new("Contact")
            .extends("Party")
            .plain("name")
            .encrypted("phone")
            .blind_index("phone_index", "phone")
            .embedded("address", "Address");
        assert_eq!(schema.extends.as_deref(), Some("Party"));
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "phone", "phone_index", "address"]);
    }

    #[test]
    fn yaml_markers_parse() {
        let yaml = r#"
name: Contact
fields:
  - name: phone
    kind: encrypted
  - name: phone_index
    kind: blind_index
    target: phone
    scope: phones
  - name: address
    kind: embedded
    schema: Address
"#;
        let schema: RecordSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.fields[0].marker, FieldMarker::Encrypted);
        assert_eq!(
            schema.fields[1].marker,
            FieldMarker::BlindIndex {
                target: "phone".into(),
                scope: Some("phones".into()),
            }
        );
        assert_eq!(
            schema.fields[2].marker,
            FieldMarker::Embedded {
                schema: "Address".into()
            }
        );
    }

    #[test]
    fn unknown_kind_rejected() {
        let yaml = "name: X\nfields:\n  - name: a\n    kind: hashed\n";
        assert!(serde_yaml::from_str::<RecordSchema>(yaml).is_err());
    }
}

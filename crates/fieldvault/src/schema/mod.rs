//! Declarative record schemas, field classification, and schema loading.
//!
//! # Responsibilities
//!
//! - Hold the per-type declarations that replace runtime field annotations.
//! - Resolve a declaration (plus its `extends` chain) into a
//!   [`FieldClassification`] once, and cache it for the process lifetime.
//! - Parse declarations from YAML or JSON documents.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** This module must not import anything from
//!   `crate::crypto` or `crate::lifecycle`.

pub mod cache;
pub mod classifier;
pub mod declaration;

pub use cache::ClassificationCache;
pub use classifier::{ClassificationError, Classifier, FieldClassification, FieldKind};
pub use declaration::{FieldDecl, FieldMarker, RecordSchema};

use std::path::Path;

use tracing::info;

/// Parse a list of record schemas from a YAML document, falling back to JSON.
///
/// # Errors
///
/// Returns [`ClassificationError::InvalidDocument`] if the text is neither.
pub fn parse_schemas(text: &str) -> Result<Vec<RecordSchema>, ClassificationError> {
    if let Ok(parsed) = serde_yaml::from_str::<Vec<RecordSchema>>(text) {
        Ok(parsed)
    } else if let Ok(parsed) = serde_json::from_str::<Vec<RecordSchema>>(text) {
        Ok(parsed)
    } else {
        Err(ClassificationError::InvalidDocument(
            "not a valid YAML or JSON list of record schemas".into(),
        ))
    }
}

/// Read `path`, parse it with [`parse_schemas`], and register every schema.
///
/// Returns the number of schemas registered.
///
/// # Errors
///
/// Returns [`ClassificationError::InvalidDocument`] if the file cannot be read
/// or parsed, or any registration error.
pub fn load_file(path: &Path, classifier: &Classifier) -> Result<usize, ClassificationError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ClassificationError::InvalidDocument(format!("failed to read {}: {e}", path.display()))
    })?;
    let schemas = parse_schemas(&text)?;
    let count = classifier.register_all(schemas)?;
    info!(path = %path.display(), count, "loaded record schemas");
    Ok(count)
}

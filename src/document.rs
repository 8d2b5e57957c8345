//! Structured rule-document model.
//!
//! Typed representation of the JSON output format. The document targets a
//! JSON-based import workflow that fills in its own author on import, which is
//! why the author here is a fixed placeholder rather than the feed author
//! configured on the filter set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version literal carried by every structured document.
pub const DOCUMENT_VERSION: &str = "v1alpha3";

/// Placeholder author name emitted in every structured document.
pub const PLACEHOLDER_AUTHOR_NAME: &str = "YOUR NAME HERE (auto imported)";

/// Placeholder author email emitted in every structured document.
pub const PLACEHOLDER_AUTHOR_EMAIL: &str = "your-email@gmail.com";

/// The complete structured rule document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredDocument {
    /// Format version, always [`DOCUMENT_VERSION`].
    pub version: String,
    /// Placeholder author, replaced by the importer.
    pub author: DocumentAuthor,
    /// Merged label set; omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LabelEntry>>,
    /// Filter records in declaration order; omitted when there are none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Value>>,
}

impl StructuredDocument {
    /// Creates a document with the fixed version and placeholder author and
    /// no labels or rules.
    pub fn new() -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            author: DocumentAuthor::placeholder(),
            labels: None,
            rules: None,
        }
    }
}

impl Default for StructuredDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Author block of the structured document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAuthor {
    /// Author display name.
    pub name: String,
    /// Author email address.
    pub email: String,
}

impl DocumentAuthor {
    /// Returns the fixed placeholder author.
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_AUTHOR_NAME.to_string(),
            email: PLACEHOLDER_AUTHOR_EMAIL.to_string(),
        }
    }
}

/// One entry in the merged label list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    /// Label name as it appears in the mail system.
    pub name: String,
}

impl From<String> for LabelEntry {
    fn from(name: String) -> Self {
        Self { name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_omits_labels_and_rules() {
        let doc = StructuredDocument::new();
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["version"], "v1alpha3");
        assert_eq!(json["author"]["name"], PLACEHOLDER_AUTHOR_NAME);
        assert_eq!(json["author"]["email"], PLACEHOLDER_AUTHOR_EMAIL);
        assert!(json.get("labels").is_none());
        assert!(json.get("rules").is_none());
    }

    #[test]
    fn populated_document_serializes_labels_as_name_objects() {
        let mut doc = StructuredDocument::new();
        doc.labels = Some(vec![LabelEntry::from("work".to_string())]);
        doc.rules = Some(vec![serde_json::json!({"actions": {"archive": true}})]);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["labels"], serde_json::json!([{"name": "work"}]));
        assert_eq!(json["rules"][0]["actions"]["archive"], true);
    }

    #[test]
    fn document_round_trips() {
        let mut doc = StructuredDocument::new();
        doc.labels = Some(vec![LabelEntry::from("a".to_string())]);

        let text = serde_json::to_string_pretty(&doc).unwrap();
        let back: StructuredDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back.author, DocumentAuthor::placeholder());
        assert_eq!(back.labels.unwrap()[0].name, "a");
    }
}

//! The vocabulary record data model

use indexmap::IndexMap;
use lexideck_core::RecordId;
use serde::{Deserialize, Serialize};

/// One vocabulary entry: a stable id, a language tag, and an ordered
/// mapping of field name to text value.
///
/// Records are immutable once loaded; enrichment attaches media to the
/// build context, never to the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    language: String,
    fields: IndexMap<String, String>,
}

impl Record {
    /// Create a record. Field order is preserved as given.
    pub fn new(id: RecordId, language: &str, fields: IndexMap<String, String>) -> Self {
        Self {
            id,
            language: language.to_string(),
            fields,
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// ISO language tag (e.g. "de", "ko")
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Look up a field value by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// All fields in their original order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut fields = IndexMap::new();
        fields.insert("word".to_string(), "Hund".to_string());
        fields.insert("example".to_string(), "Der Hund schläft.".to_string());
        Record::new(RecordId::new("noun-001"), "de", fields)
    }

    #[test]
    fn test_field_lookup() {
        let r = sample();
        assert_eq!(r.field("word"), Some("Hund"));
        assert_eq!(r.field("missing"), None);
        assert_eq!(r.language(), "de");
    }

    #[test]
    fn test_field_order_preserved() {
        let r = sample();
        let names: Vec<&str> = r.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["word", "example"]);
    }
}

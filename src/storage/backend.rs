//! Document store trait and backend selection.
//!
//! The service treats its database as a managed document store: named
//! collections of JSON documents addressed by id, with whole-document
//! writes, top-level field updates, and atomic array appends (plain and
//! union).
//!
//! Implementations:
//! - `SqliteStore` - a single SQLite file (default)
//! - `MemoryStore` - process-local maps, for tests and throwaway runs

use crate::Result;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// A stored document body: a JSON object without its id.
pub type Document = Map<String, Value>;

/// Sort direction for [`DocumentStore::list_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Trait for the document database behind the API.
///
/// Every call is atomic on its own. Nothing spans calls: a caller that reads
/// a document, edits it, and writes it back can lose a concurrent update.
pub trait DocumentStore: Send {
    /// Fetch a document, or `None` if it does not exist.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// All documents in a collection, in insertion order.
    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    /// All documents in a collection, ordered by a top-level field.
    ///
    /// Documents missing the field sort as null (first when ascending).
    /// Ties keep insertion order.
    fn list_ordered(
        &self,
        collection: &str,
        field: &str,
        direction: SortDirection,
    ) -> Result<Vec<(String, Document)>> {
        let mut docs = self.list(collection)?;
        docs.sort_by(|(_, a), (_, b)| {
            let ord = compare_values(a.get(field), b.get(field));
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
        Ok(docs)
    }

    /// Insert a document under a generated id and return the id.
    fn add(&mut self, collection: &str, doc: Document) -> Result<String>;

    /// Insert a document under a caller-chosen id.
    ///
    /// Fails with `Error::Conflict` if the id is taken.
    fn create(&mut self, collection: &str, id: &str, doc: Document) -> Result<()>;

    /// Write a document, replacing any existing body.
    fn set(&mut self, collection: &str, id: &str, doc: Document) -> Result<()>;

    /// Overwrite the given top-level fields of an existing document.
    ///
    /// Fails with `Error::NotFound` if the document does not exist.
    fn update(&mut self, collection: &str, id: &str, fields: Document) -> Result<()>;

    /// Append each value to an array field unless an equal element is
    /// already present. A missing or non-array field becomes an array.
    ///
    /// Fails with `Error::NotFound` if the document does not exist.
    fn array_union(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()>;

    /// Append each value to an array field, duplicates included. A missing
    /// or non-array field becomes an array.
    ///
    /// Fails with `Error::NotFound` if the document does not exist.
    fn array_append(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()>;

    /// Delete a document. Returns whether it existed; deleting a missing
    /// document is not an error.
    fn delete(&mut self, collection: &str, id: &str) -> Result<bool>;

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;

    /// Get the backend type.
    fn backend_type(&self) -> StoreBackend;
}

/// Available store backend types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    /// SQLite file under the data directory (default)
    #[default]
    Sqlite,
    /// Process-local, lost on exit
    Memory,
}

impl StoreBackend {
    /// Parse a backend type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "file" | "default" => Some(Self::Sqlite),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Merge `fields` into `doc`, replacing top-level keys.
pub(crate) fn merge_fields(doc: &mut Document, fields: Document) {
    for (key, value) in fields {
        doc.insert(key, value);
    }
}

/// Array-union `values` into `doc[field]`.
pub(crate) fn union_into(doc: &mut Document, field: &str, values: Vec<Value>) {
    edit_array(doc, field, |items| {
        for value in values {
            if !items.contains(&value) {
                items.push(value);
            }
        }
    });
}

/// Append `values` to `doc[field]`, keeping duplicates.
pub(crate) fn append_into(doc: &mut Document, field: &str, values: Vec<Value>) {
    edit_array(doc, field, |items| items.extend(values));
}

/// A missing or non-array field starts out empty.
fn edit_array<F>(doc: &mut Document, field: &str, edit: F)
where
    F: FnOnce(&mut Vec<Value>),
{
    let mut items = match doc.remove(field) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    edit(&mut items);
    doc.insert(field.to_string(), Value::Array(items));
}

/// Order: missing/null < bool < number < string < array < object.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_parse() {
        assert_eq!(StoreBackend::parse("sqlite"), Some(StoreBackend::Sqlite));
        assert_eq!(StoreBackend::parse("MEMORY"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("postgres"), None);
        assert_eq!(StoreBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_union_into_skips_equal_elements() {
        let mut doc = Document::new();
        doc.insert("Recurso".into(), json!([{"Nombre": "Ana", "Rol": "QA"}]));
        union_into(
            &mut doc,
            "Recurso",
            vec![
                json!({"Rol": "QA", "Nombre": "Ana"}),
                json!({"Nombre": "Luis", "Rol": "Dev"}),
            ],
        );
        assert_eq!(doc["Recurso"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_union_into_replaces_non_array() {
        let mut doc = Document::new();
        doc.insert("Hito".into(), json!("oops"));
        union_into(&mut doc, "Hito", vec![json!(1)]);
        assert_eq!(doc["Hito"], json!([1]));
    }

    #[test]
    fn test_append_into_keeps_duplicates() {
        let mut doc = Document::new();
        append_into(&mut doc, "Hito", vec![json!({"n": 1})]);
        append_into(&mut doc, "Hito", vec![json!({"n": 1}), json!({"n": 2})]);
        assert_eq!(doc["Hito"], json!([{"n": 1}, {"n": 1}, {"n": 2}]));

        doc.insert("Recurso".into(), json!(null));
        append_into(&mut doc, "Recurso", vec![json!(1)]);
        assert_eq!(doc["Recurso"], json!([1]));
    }

    #[test]
    fn test_compare_values_type_rank() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(10))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(Some(&json!("b")), Some(&json!("a"))),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(Some(&json!(99)), Some(&json!("a"))),
            Ordering::Less
        );
    }
}

//! In-memory document store.

use super::backend::{Document, DocumentStore, StoreBackend, append_into, merge_fields, union_into};
use super::generate_id;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Process-local store. Collections keep documents in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<(String, Document)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, collection: &str, id: &str) -> Option<&Document> {
        self.collections
            .get(collection)?
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc)
    }

    fn find_mut(&mut self, collection: &str, id: &str) -> Option<&mut Document> {
        self.collections
            .get_mut(collection)?
            .iter_mut()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc)
    }

    fn existing_mut(&mut self, collection: &str, id: &str) -> Result<&mut Document> {
        self.find_mut(collection, id).ok_or_else(|| {
            Error::NotFound(format!("No document to update: {}/{}", collection, id))
        })
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.find(collection, id).cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    fn add(&mut self, collection: &str, doc: Document) -> Result<String> {
        let id = generate_id();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), doc));
        Ok(id)
    }

    fn create(&mut self, collection: &str, id: &str, doc: Document) -> Result<()> {
        if self.find(collection, id).is_some() {
            return Err(Error::Conflict(format!(
                "Document already exists: {}/{}",
                collection, id
            )));
        }
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push((id.to_string(), doc));
        Ok(())
    }

    fn set(&mut self, collection: &str, id: &str, doc: Document) -> Result<()> {
        if let Some(existing) = self.find_mut(collection, id) {
            *existing = doc;
            return Ok(());
        }
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push((id.to_string(), doc));
        Ok(())
    }

    fn update(&mut self, collection: &str, id: &str, fields: Document) -> Result<()> {
        merge_fields(self.existing_mut(collection, id)?, fields);
        Ok(())
    }

    fn array_union(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()> {
        union_into(self.existing_mut(collection, id)?, field, values);
        Ok(())
    }

    fn array_append(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()> {
        append_into(self.existing_mut(collection, id)?, field, values);
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<bool> {
        let Some(docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|(doc_id, _)| doc_id != id);
        Ok(docs.len() < before)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}

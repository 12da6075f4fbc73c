//! Storage layer for qatrack data.
//!
//! This module owns the document store abstraction and the collections the
//! service uses:
//!
//! - `proyectos` - project documents with their nested milestone tree
//! - `tasks` - standalone task tracker items
//! - `users` - tracker users, keyed by email
//! - `profiles` - registration profiles, keyed by identity uid
//! - `identities` - identity records, keyed by email
//!
//! ## Backends
//!
//! - **SQLite** (default): `<data-dir>/store.db`
//! - **Memory**: nothing persisted

pub mod backend;
pub mod memory;
pub mod sqlite;

pub use backend::{Document, DocumentStore, SortDirection, StoreBackend};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Project documents.
pub const PROJECTS: &str = "proyectos";
/// Task tracker items.
pub const TASKS: &str = "tasks";
/// Tracker users, keyed by email.
pub const USERS: &str = "users";
/// Registration profiles, keyed by identity uid.
pub const PROFILES: &str = "profiles";
/// Identity records, keyed by email.
pub const IDENTITIES: &str = "identities";

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "store.db";

/// Open the configured store.
pub fn open_store(backend: StoreBackend, data_dir: &Path) -> Result<Box<dyn DocumentStore>> {
    let store: Box<dyn DocumentStore> = match backend {
        StoreBackend::Sqlite => Box::new(SqliteStore::open(&data_dir.join(DATABASE_FILE))?),
        StoreBackend::Memory => Box::new(MemoryStore::new()),
    };
    info!(backend = %backend, location = %store.location(), "Opened document store");
    Ok(store)
}

/// Get the data directory.
///
/// Uses `explicit` when given, otherwise `~/.local/share/qatrack/`.
pub fn get_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("qatrack"))
}

/// Generate a document id (32 lowercase hex chars).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Serialize a value into a document body.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Other(format!(
            "Expected a JSON object for a document, got: {}",
            other
        ))),
    }
}

/// Deserialize a document body into a typed value.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Render a document for a response: its fields plus `id`.
pub fn with_id(id: &str, mut doc: Document) -> Value {
    doc.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(doc)
}

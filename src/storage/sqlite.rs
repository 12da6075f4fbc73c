//! SQLite-backed document store.
//!
//! All collections share one `documents` table. Bodies are stored as JSON
//! text; `seq` records insertion order so listings are stable. Field-ordered
//! queries use SQLite's JSON functions.

use super::backend::{
    Document, DocumentStore, SortDirection, StoreBackend, append_into, merge_fields, union_into,
};
use super::generate_id;
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Document store over a single SQLite database.
pub struct SqliteStore {
    /// Database file, or `None` for an in-memory database
    path: Option<PathBuf>,
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn,
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { path: None, conn })
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            "#,
        )?;
        Ok(())
    }

    fn read_body(conn: &Connection, collection: &str, id: &str) -> Result<Option<Document>> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| parse_body(&text)).transpose()
    }

    fn write_body(conn: &Connection, collection: &str, id: &str, doc: &Document) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO documents (collection, id, body, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
            params![collection, id, serde_json::to_string(doc)?, now],
        )?;
        Ok(())
    }

    /// Read-modify-write one document inside an immediate transaction.
    fn modify<F>(&mut self, collection: &str, id: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Document),
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut doc = Self::read_body(&tx, collection, id)?.ok_or_else(|| {
            Error::NotFound(format!("No document to update: {}/{}", collection, id))
        })?;
        edit(&mut doc);
        Self::write_body(&tx, collection, id, &doc)?;
        tx.commit()?;
        Ok(())
    }

    fn query_documents(&self, sql: &str, collection: &str) -> Result<Vec<(String, Document)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body)| Ok((id, parse_body(&body)?)))
            .collect()
    }
}

fn parse_body(text: &str) -> Result<Document> {
    Ok(serde_json::from_str(text)?)
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Self::read_body(&self.conn, collection, id)
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        self.query_documents(
            "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq ASC",
            collection,
        )
    }

    fn list_ordered(
        &self,
        collection: &str,
        field: &str,
        direction: SortDirection,
    ) -> Result<Vec<(String, Document)>> {
        let dir = match direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        let path = format!("$.\"{}\"", field.replace('"', "\\\""));
        let sql = format!(
            "SELECT id, body FROM documents WHERE collection = ?1 \
             ORDER BY json_extract(body, '{}') {}, seq ASC",
            path.replace('\'', "''"),
            dir
        );
        self.query_documents(&sql, collection)
    }

    fn add(&mut self, collection: &str, doc: Document) -> Result<String> {
        let id = generate_id();
        self.create(collection, &id, doc)?;
        Ok(id)
    }

    fn create(&mut self, collection: &str, id: &str, doc: Document) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = self.conn.execute(
            "INSERT INTO documents (collection, id, body, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![collection, id, serde_json::to_string(&doc)?, now],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(format!(
                    "Document already exists: {}/{}",
                    collection, id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, collection: &str, id: &str, doc: Document) -> Result<()> {
        Self::write_body(&self.conn, collection, id, &doc)
    }

    fn update(&mut self, collection: &str, id: &str, fields: Document) -> Result<()> {
        self.modify(collection, id, |doc| merge_fields(doc, fields))
    }

    fn array_union(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()> {
        self.modify(collection, id, |doc| union_into(doc, field, values))
    }

    fn array_append(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()> {
        self.modify(collection, id, |doc| append_into(doc, field, values))
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(removed > 0)
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }

    fn backend_type(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }
}

//! qatrack - project quality tracking over a document store.
//!
//! This library provides the core of the `qatrack` service: the project
//! tree model (milestones, tests, defects, resources), the nested-path
//! resolver that edits it, the metrics aggregator, a small task/user
//! tracker, and the HTTP API that exposes all of it.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod nested;
pub mod storage;
pub mod validation;


/// Library-level error type for qatrack operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// A document, or an index inside one, does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A request body failed its schema check.
    #[error("{0}")]
    Validation(String),

    /// A create collided with an existing document.
    #[error("{0}")]
    Conflict(String),

    /// Missing, malformed or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for qatrack operations.
pub type Result<T> = std::result::Result<T, Error>;

//! HTTP API for projects, metrics, accounts and the task tracker.
//!
//! - `server` - shared state, router, startup and shutdown
//! - `error` - mapping library errors to status codes and JSON bodies
//! - one module per resource family for the handlers

pub mod auth;
pub mod error;
pub mod metrics;
pub mod projects;
pub mod server;
pub mod tasks;
pub mod tree;
pub mod users;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, router, start_server};

//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The `QatrackConfig` struct mirroring the file
//! - Parsing from KDL documents
//! - Validation
//!
//! Every field is optional; unset fields fall through to environment
//! variables and built-in defaults in the resolver.

use crate::storage::StoreBackend;
use kdl::{KdlDocument, KdlValue};
use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Service settings stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// host "0.0.0.0"
/// port 8080
/// store "sqlite"          // or "memory"
/// log-level "qatrack=debug,tower_http=info"
/// log-format "json"       // or "pretty"
/// log-dir "/var/log/qatrack"
/// token-ttl-minutes 120
/// token-secret "change-me"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QatrackConfig {
    /// Address to bind the HTTP server to
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    pub port: Option<u16>,

    /// Document store backend
    pub store: Option<StoreBackend>,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: Option<String>,

    pub log_format: Option<LogFormat>,

    /// Directory for daily-rolling log files
    pub log_dir: Option<PathBuf>,

    /// Lifetime of issued login tokens
    pub token_ttl_minutes: Option<u32>,

    /// HS256 signing secret for login tokens (sensitive!)
    pub token_secret: Option<String>,
}

impl QatrackConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == Some(0) {
            return Err("port must be 1-65535, got 0".to_string());
        }
        if let Some(ttl) = self.token_ttl_minutes {
            if !(1..=1440).contains(&ttl) {
                return Err(format!("token-ttl-minutes must be 1-1440, got {}", ttl));
            }
        }
        if let Some(ref host) = self.host {
            if host.trim().is_empty() {
                return Err("host must not be empty".to_string());
            }
        }
        if let Some(ref secret) = self.token_secret {
            if secret.is_empty() {
                return Err("token-secret must not be empty".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Values of the wrong type are reported rather than ignored, so a typo
    /// in the file never silently falls back to a default.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self, String> {
        let mut config = Self::new();

        config.host = string_node(doc, "host")?;

        if let Some(port) = integer_node(doc, "port")? {
            config.port = Some(
                u16::try_from(port).map_err(|_| format!("port out of range: {}", port))?,
            );
        }

        if let Some(store) = string_node(doc, "store")? {
            config.store = Some(
                StoreBackend::parse(&store)
                    .ok_or_else(|| format!("unknown store backend: {}", store))?,
            );
        }

        config.log_level = string_node(doc, "log-level")?;

        if let Some(format) = string_node(doc, "log-format")? {
            config.log_format = Some(
                LogFormat::parse(&format)
                    .ok_or_else(|| format!("unknown log-format: {}", format))?,
            );
        }

        config.log_dir = string_node(doc, "log-dir")?.map(PathBuf::from);

        if let Some(ttl) = integer_node(doc, "token-ttl-minutes")? {
            config.token_ttl_minutes = Some(
                u32::try_from(ttl)
                    .map_err(|_| format!("token-ttl-minutes out of range: {}", ttl))?,
            );
        }

        config.token_secret = string_node(doc, "token-secret")?;

        Ok(config)
    }
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn string_node(doc: &KdlDocument, name: &str) -> Result<Option<String>, String> {
    match first_value(doc, name) {
        None => Ok(None),
        Some(value) => value
            .as_string()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| format!("{} must be a string", name)),
    }
}

fn integer_node(doc: &KdlDocument, name: &str) -> Result<Option<i128>, String> {
    match first_value(doc, name) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .map(Some)
            .ok_or_else(|| format!("{} must be an integer", name)),
    }
}

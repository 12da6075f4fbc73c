//! Precedence resolution for service configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`QATRACK_HOST`, `QATRACK_PORT`, ...)
//! 3. config.kdl
//! 4. Built-in defaults
//!
//! `log-level`, `log-format` and `log-dir` have no environment variable of
//! their own; `RUST_LOG` overrides the level at subscriber setup instead.

use super::schema::{LogFormat, QatrackConfig};
use crate::storage::{StoreBackend, generate_id};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the bind address.
pub const HOST_ENV: &str = "QATRACK_HOST";
/// Environment variable for the bind port.
pub const PORT_ENV: &str = "QATRACK_PORT";
/// Environment variable for the store backend.
pub const STORE_ENV: &str = "QATRACK_STORE";
/// Environment variable for the token signing secret.
pub const TOKEN_SECRET_ENV: &str = "QATRACK_TOKEN_SECRET";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TOKEN_TTL_MINUTES: u32 = 60;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from a config.kdl file
    File(String),
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
    /// Generated at startup (random token secret)
    Generated,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::File(path) => write!(f, "file:{}", path),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
            ValueSource::Generated => write!(f, "generated"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub host: Resolved<String>,
    pub port: Resolved<u16>,
    pub store: Resolved<StoreBackend>,
    pub log_level: Resolved<String>,
    pub log_format: Resolved<LogFormat>,
    pub log_dir: Option<Resolved<PathBuf>>,
    pub token_ttl_minutes: Resolved<u32>,
    pub token_secret: Resolved<String>,
}

impl ResolvedConfig {
    /// Socket address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host.value, self.port.value)
    }

    /// Whether the token secret was generated for this process only.
    ///
    /// Tokens signed with a generated secret stop verifying on restart.
    pub fn has_ephemeral_secret(&self) -> bool {
        self.token_secret.source == ValueSource::Generated
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Bind address override from CLI flag
    pub host: Option<String>,
    /// Port override from CLI flag
    pub port: Option<u16>,
    /// Store backend override from CLI flag
    pub store: Option<StoreBackend>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bind address override.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set port override.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set store backend override.
    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = Some(store);
        self
    }
}

/// Resolve configuration against the process environment.
///
/// `file_path` is only used to label values that came from `file`.
pub fn resolve_config(
    file: &QatrackConfig,
    file_path: &Path,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    resolve_config_with_env(file, file_path, overrides, |name| std::env::var(name).ok())
}

/// Resolve configuration with an explicit environment lookup.
pub fn resolve_config_with_env<F>(
    file: &QatrackConfig,
    file_path: &Path,
    overrides: &ConfigOverrides,
    env: F,
) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file_source = ValueSource::File(file_path.display().to_string());
    let env_value = |name: &str| env(name).filter(|v| !v.is_empty());

    // Resolve host
    let host = if let Some(ref host) = overrides.host {
        Resolved::new(host.clone(), ValueSource::CliFlag)
    } else if let Some(host) = env_value(HOST_ENV) {
        Resolved::new(host, ValueSource::EnvVar(HOST_ENV.to_string()))
    } else if let Some(ref host) = file.host {
        Resolved::new(host.clone(), file_source.clone())
    } else {
        Resolved::new(DEFAULT_HOST.to_string(), ValueSource::Default)
    };

    // Resolve port
    let port = if let Some(port) = overrides.port {
        Resolved::new(port, ValueSource::CliFlag)
    } else if let Some(raw) = env_value(PORT_ENV) {
        let port = raw
            .parse::<u16>()
            .map_err(|_| Error::Config(format!("{} is not a valid port: {}", PORT_ENV, raw)))?;
        Resolved::new(port, ValueSource::EnvVar(PORT_ENV.to_string()))
    } else if let Some(port) = file.port {
        Resolved::new(port, file_source.clone())
    } else {
        Resolved::new(DEFAULT_PORT, ValueSource::Default)
    };

    // Resolve store
    let store = if let Some(store) = overrides.store {
        Resolved::new(store, ValueSource::CliFlag)
    } else if let Some(raw) = env_value(STORE_ENV) {
        let store = StoreBackend::parse(&raw).ok_or_else(|| {
            Error::Config(format!("{} names an unknown store backend: {}", STORE_ENV, raw))
        })?;
        Resolved::new(store, ValueSource::EnvVar(STORE_ENV.to_string()))
    } else if let Some(store) = file.store {
        Resolved::new(store, file_source.clone())
    } else {
        Resolved::new(StoreBackend::default(), ValueSource::Default)
    };

    let log_level = match file.log_level {
        Some(ref level) => Resolved::new(level.clone(), file_source.clone()),
        None => Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default),
    };

    let log_format = match file.log_format {
        Some(format) => Resolved::new(format, file_source.clone()),
        None => Resolved::new(LogFormat::default(), ValueSource::Default),
    };

    let log_dir = file
        .log_dir
        .as_ref()
        .map(|dir| Resolved::new(dir.clone(), file_source.clone()));

    let token_ttl_minutes = match file.token_ttl_minutes {
        Some(ttl) => Resolved::new(ttl, file_source.clone()),
        None => Resolved::new(DEFAULT_TOKEN_TTL_MINUTES, ValueSource::Default),
    };

    // Resolve token secret
    let token_secret = if let Some(secret) = env_value(TOKEN_SECRET_ENV) {
        Resolved::new(secret, ValueSource::EnvVar(TOKEN_SECRET_ENV.to_string()))
    } else if let Some(ref secret) = file.token_secret {
        Resolved::new(secret.clone(), file_source)
    } else {
        Resolved::new(format!("{}{}", generate_id(), generate_id()), ValueSource::Generated)
    };

    let resolved = ResolvedConfig {
        host,
        port,
        store,
        log_level,
        log_format,
        log_dir,
        token_ttl_minutes,
        token_secret,
    };
    validate_resolved(&resolved)?;
    Ok(resolved)
}

/// Re-check the rules config.kdl is held to, for values from CLI and env.
fn validate_resolved(resolved: &ResolvedConfig) -> Result<()> {
    let flattened = QatrackConfig {
        host: Some(resolved.host.value.clone()),
        port: Some(resolved.port.value),
        store: Some(resolved.store.value),
        log_level: Some(resolved.log_level.value.clone()),
        log_format: Some(resolved.log_format.value),
        log_dir: resolved.log_dir.as_ref().map(|r| r.value.clone()),
        token_ttl_minutes: Some(resolved.token_ttl_minutes.value),
        token_secret: Some(resolved.token_secret.value.clone()),
    };
    flattened.validate().map_err(Error::Config)
}

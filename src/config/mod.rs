//! Configuration for the qatrack service.
//!
//! ## config.kdl
//!
//! Located at (first match wins):
//! - `--config <path>` / `QATRACK_CONFIG`
//! - `~/.config/qatrack/config.kdl`
//!
//! Contains server, store, logging and token settings. See
//! [`schema::QatrackConfig`] for the node list.
//!
//! ## Security
//!
//! `token-secret` signs login tokens. Prefer `QATRACK_TOKEN_SECRET` over
//! keeping it in the file.
//!
//! ## Precedence
//!
//! CLI flag > environment variable > config.kdl > defaults
//!
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, resolve_config,
    resolve_config_with_env,
};
pub use schema::{LogFormat, QatrackConfig};

use crate::{Error, Result};
use kdl::KdlDocument;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file name.
pub const CONFIG_FILE: &str = "config.kdl";

/// Default config location: `~/.config/qatrack/config.kdl`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("qatrack").join(CONFIG_FILE))
}

/// Read and validate a config.kdl file.
///
/// A missing file at the default location yields an empty config. A missing
/// file the user pointed at explicitly is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<(QatrackConfig, PathBuf)> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok((QatrackConfig::default(), PathBuf::from(CONFIG_FILE))),
        },
    };

    if !path.exists() {
        if required {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok((QatrackConfig::default(), path));
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok((config, path))
}

/// Parse and validate config.kdl contents.
pub fn parse_config(content: &str) -> std::result::Result<QatrackConfig, String> {
    let doc: KdlDocument = content.parse().map_err(|e| format!("invalid KDL: {}", e))?;
    let config = QatrackConfig::from_kdl(&doc)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "port 4100\nstore \"memory\"\n").unwrap();

        let (config, loaded_from) = load_config(Some(&path)).unwrap();
        assert_eq!(config.port, Some(4100));
        assert_eq!(loaded_from, path);
    }

    #[test]
    fn test_load_config_explicit_missing_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config(Some(&temp_dir.path().join("nope.kdl"))).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("not found")));
    }

    #[test]
    fn test_parse_config_errors() {
        assert!(parse_config("port {").unwrap_err().contains("invalid KDL"));
        assert!(parse_config("token-ttl-minutes 0").unwrap_err().contains("1-1440"));
        assert!(parse_config("").unwrap() == QatrackConfig::default());
    }
}

//! Common test utilities for qatrack integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.local/share/qatrack/` or `~/.config/qatrack/`.

#![allow(dead_code)]

use assert_cmd::Command;
use qatrack::models::Project;
use qatrack::storage::{self, DATABASE_FILE, DocumentStore, PROJECTS, SqliteStore};
use std::fs;
use std::path::PathBuf;
pub use tempfile::TempDir;

/// Environment variables that would leak host settings into a test run.
const HOST_VARS: &[&str] = &[
    "QATRACK_CONFIG",
    "QATRACK_DATA_DIR",
    "QATRACK_HOST",
    "QATRACK_PORT",
    "QATRACK_STORE",
    "QATRACK_TOKEN_SECRET",
];

/// A test environment with isolated data and config.
///
/// - `data_dir`: holds the SQLite store (via `QATRACK_DATA_DIR`)
/// - `config_dir`: holds `config.kdl` (via `QATRACK_CONFIG`)
///
/// The `qatrack()` method sets both per-invocation, making tests
/// parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an empty config file.
    pub fn new() -> Self {
        let env = Self {
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        };
        env.write_config("");
        env
    }

    /// Replace the contents of the environment's config.kdl.
    pub fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).unwrap();
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("config.kdl")
    }

    /// Get a Command for the qatrack binary bound to this environment.
    pub fn qatrack(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_qatrack"));
        for var in HOST_VARS {
            cmd.env_remove(var);
        }
        cmd.env("QATRACK_DATA_DIR", self.data_dir.path());
        cmd.env("QATRACK_CONFIG", self.config_path());
        cmd
    }

    /// Open the environment's SQLite store directly.
    pub fn store(&self) -> SqliteStore {
        SqliteStore::open(&self.data_dir.path().join(DATABASE_FILE)).unwrap()
    }

    /// Insert a project straight into the store and return its id.
    pub fn seed_project(&self, project: &Project) -> String {
        let mut store = self.store();
        store
            .add(PROJECTS, storage::to_document(project).unwrap())
            .unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

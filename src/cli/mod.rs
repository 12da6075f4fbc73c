//! CLI argument definitions for qatrack.

use crate::storage::StoreBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qatrack - project milestone, test and defect tracking API.
///
/// Run `qatrack serve` to start the HTTP API, or `qatrack metrics` to print
/// the same aggregates the API serves.
#[derive(Parser, Debug)]
#[command(name = "qatrack")]
#[command(author, version, about = "HTTP API for project QA tracking", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Path to config.kdl (default: ~/.config/qatrack/config.kdl)
    #[arg(long = "config", global = true, env = "QATRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the SQLite store (default: ~/.local/share/qatrack)
    #[arg(long = "data-dir", global = true, env = "QATRACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API until Ctrl+C or SIGTERM
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Document store backend (sqlite, memory)
        #[arg(long, value_parser = parse_store)]
        store: Option<StoreBackend>,
    },

    /// Print project metrics (per-project list by default)
    Metrics {
        /// Metrics for a single project
        #[arg(long, conflicts_with = "all")]
        project: Option<String>,

        /// Totals across all projects
        #[arg(long)]
        all: bool,
    },
}

fn parse_store(s: &str) -> Result<StoreBackend, String> {
    StoreBackend::parse(s)
        .ok_or_else(|| format!("unknown store '{}' (expected sqlite or memory)", s))
}

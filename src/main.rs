//! qatrack CLI - serve the tracking API or print metrics.

use clap::Parser;
use qatrack::cli::{Cli, Commands};
use qatrack::commands::{self, MetricsSelection};
use qatrack::config::{self, ConfigOverrides, ResolvedConfig};
use qatrack::logging::{self, LoggingOptions};
use qatrack::storage;
use std::path::PathBuf;
use std::process;
use tracing::{info, warn};

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    if let Err(e) = run(cli) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> qatrack::Result<()> {
    let (file_config, config_path) = config::load_config(cli.config.as_deref())?;

    let overrides = match &cli.command {
        Commands::Serve { host, port, store } => {
            let mut overrides = ConfigOverrides::new();
            if let Some(host) = host {
                overrides = overrides.with_host(host.clone());
            }
            if let Some(port) = port {
                overrides = overrides.with_port(*port);
            }
            if let Some(store) = store {
                overrides = overrides.with_store(*store);
            }
            overrides
        }
        Commands::Metrics { .. } => ConfigOverrides::new(),
    };
    let resolved = config::resolve_config(&file_config, &config_path, &overrides)?;

    let _log_guard = logging::init(&LoggingOptions::from_config(&resolved))?;
    info!(path = %config_path.display(), "Loaded configuration");

    let data_dir = storage::get_data_dir(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Serve { .. } => serve(&resolved, data_dir),
        Commands::Metrics { project, all } => {
            let selection = match (project, all) {
                (Some(id), _) => MetricsSelection::Project(id),
                (None, true) => MetricsSelection::Global,
                (None, false) => MetricsSelection::PerProject,
            };
            let store = storage::open_store(resolved.store.value, &data_dir)?;
            let report = commands::metrics(&*store, &selection)?;
            commands::print_output(&report, cli.human_readable);
            Ok(())
        }
    }
}

fn serve(resolved: &ResolvedConfig, data_dir: PathBuf) -> qatrack::Result<()> {
    if resolved.has_ephemeral_secret() {
        warn!("No token secret configured; login tokens will not survive a restart");
    }
    info!(
        host = %resolved.host.value,
        host_source = %resolved.host.source,
        port = resolved.port.value,
        port_source = %resolved.port.source,
        store = %resolved.store.value,
        "Resolved server settings"
    );
    let store = storage::open_store(resolved.store.value, &data_dir)?;
    commands::serve(resolved, store)
}

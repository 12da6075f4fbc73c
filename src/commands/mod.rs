//! Command implementations for the qatrack CLI.
//!
//! - `serve` - run the HTTP API over a store
//! - `metrics` - compute project metrics straight from a store

use crate::Result;
use crate::api::{AppState, start_server};
use crate::config::ResolvedConfig;
use crate::identity::{StoreIdentityProvider, TokenIssuer};
use crate::metrics::{self, GlobalMetrics, NamedProjectMetrics, ProjectMetrics};
use crate::storage::DocumentStore;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Print a command result in the requested format.
pub fn print_output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Run the HTTP API on a fresh multi-threaded runtime until shutdown.
pub fn serve(config: &ResolvedConfig, store: Box<dyn DocumentStore>) -> Result<()> {
    let issuer = TokenIssuer::new(
        config.token_secret.value.as_bytes(),
        config.token_ttl_minutes.value,
    );
    let identity = StoreIdentityProvider::new(issuer);
    let state = AppState::new(store, Arc::new(identity));
    let addr = config.bind_addr();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_server(state, &addr))
}

/// Which metrics `qatrack metrics` prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsSelection {
    PerProject,
    Global,
    Project(String),
}

/// Result of `qatrack metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricsReport {
    PerProject(Vec<NamedProjectMetrics>),
    Global(GlobalMetrics),
    Project(ProjectMetrics),
}

/// Compute the selected metrics.
pub fn metrics(store: &dyn DocumentStore, selection: &MetricsSelection) -> Result<MetricsReport> {
    Ok(match selection {
        MetricsSelection::PerProject => MetricsReport::PerProject(metrics::per_project(store)),
        MetricsSelection::Global => MetricsReport::Global(metrics::global(store)),
        MetricsSelection::Project(id) => MetricsReport::Project(metrics::single(store, id)?),
    })
}

impl Output for MetricsReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut out = String::new();
        match self {
            Self::PerProject(list) if list.is_empty() => out.push_str("No projects."),
            Self::PerProject(list) => {
                for (i, entry) in list.iter().enumerate() {
                    if i > 0 {
                        out.push('\n');
                    }
                    let _ = writeln!(out, "{}", display_name(&entry.nombre_proyecto));
                    push_project_lines(&mut out, &entry.metrics);
                }
            }
            Self::Project(m) => push_project_lines(&mut out, m),
            Self::Global(g) => {
                let _ = writeln!(out, "Projects:   {}", g.total_proyectos);
                let _ = writeln!(out, "Milestones: {}", g.total_hitos);
                let _ = writeln!(
                    out,
                    "Tests:      {} ({} passed, {} failed, {} pending)",
                    g.total_pruebas,
                    g.total_pruebas_exitosas,
                    g.total_pruebas_erroneas,
                    g.total_pruebas_pendientes
                );
                let _ = writeln!(
                    out,
                    "Defects:    {} ({} open, {} closed)",
                    g.total_defectos, g.defectos_abiertos, g.defectos_cerrados
                );
            }
        }
        out.trim_end().to_string()
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "(unnamed)" } else { name }
}

fn push_project_lines(out: &mut String, m: &ProjectMetrics) {
    let _ = writeln!(out, "  Milestones: {}", m.total_hitos);
    let _ = writeln!(out, "  Tests:      {}", m.total_pruebas);
    let _ = writeln!(
        out,
        "  Defects:    {} ({} open, {} closed)",
        m.total_defectos, m.defectos_abiertos, m.defectos_cerrados
    );
    let share = m.porcentaje_pruebas_con_defectos;
    if share.is_nan() {
        let _ = writeln!(out, "  Tests with defects: n/a");
    } else {
        let _ = writeln!(out, "  Tests with defects: {:.1}%", share);
    }
}

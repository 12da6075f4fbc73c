//! Project metrics aggregation.
//!
//! Walks the milestone -> test -> defect tree of one or all projects and
//! tallies counts. Aggregates over all projects never fail: a store error
//! is logged and treated as zero projects, and a project that does not
//! decode is logged and skipped.

use crate::models::{DefectStatus, Project, TestOutcome};
use crate::nested::ProjectHandle;
use crate::storage::{self, DocumentStore, PROJECTS};
use crate::Result;
use serde::Serialize;
use tracing::{error, warn};

/// Statistics for a single project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetrics {
    pub total_hitos: usize,
    pub total_pruebas: usize,
    pub total_defectos: usize,
    pub defectos_abiertos: usize,
    pub defectos_cerrados: usize,
    /// Share of tests with at least one defect, 0-100.
    ///
    /// NaN when the project has no tests; serialized as `null`.
    pub porcentaje_pruebas_con_defectos: f64,
}

/// Per-project entry, labelled with the project's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedProjectMetrics {
    pub nombre_proyecto: String,
    #[serde(flatten)]
    pub metrics: ProjectMetrics,
}

/// Totals across every project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMetrics {
    pub total_proyectos: usize,
    pub total_hitos: usize,
    pub total_pruebas: usize,
    pub total_defectos: usize,
    pub defectos_abiertos: usize,
    pub defectos_cerrados: usize,
    pub total_pruebas_exitosas: usize,
    pub total_pruebas_erroneas: usize,
    pub total_pruebas_pendientes: usize,
}

/// Raw counts for one project, shared by both aggregate shapes.
#[derive(Debug, Default)]
struct Tally {
    milestones: usize,
    tests: usize,
    tests_with_defects: usize,
    defects: usize,
    open: usize,
    closed: usize,
    passed: usize,
    failed: usize,
    pending: usize,
}

impl Tally {
    fn of(project: &Project) -> Self {
        let mut tally = Tally {
            milestones: project.milestones.len(),
            ..Default::default()
        };
        for test in project.milestones.iter().flat_map(|m| m.tests.values()) {
            tally.tests += 1;
            if !test.defects.is_empty() {
                tally.tests_with_defects += 1;
            }
            match test.outcome() {
                TestOutcome::Passed => tally.passed += 1,
                TestOutcome::Failed => tally.failed += 1,
                TestOutcome::Pending => tally.pending += 1,
            }
            for defect in test.defects.values() {
                tally.defects += 1;
                match defect.status() {
                    DefectStatus::Open => tally.open += 1,
                    DefectStatus::Closed => tally.closed += 1,
                    DefectStatus::Unclassified => {}
                }
            }
        }
        tally
    }
}

/// Compute statistics for one project.
pub fn project_metrics(project: &Project) -> ProjectMetrics {
    let tally = Tally::of(project);
    let percentage = if tally.tests == 0 {
        f64::NAN
    } else {
        100.0 * tally.tests_with_defects as f64 / tally.tests as f64
    };
    ProjectMetrics {
        total_hitos: tally.milestones,
        total_pruebas: tally.tests,
        total_defectos: tally.defects,
        defectos_abiertos: tally.open,
        defectos_cerrados: tally.closed,
        porcentaje_pruebas_con_defectos: percentage,
    }
}

/// Statistics for the project with id `project_id`.
///
/// Fails with `NotFound` if the project does not exist.
pub fn single(store: &dyn DocumentStore, project_id: &str) -> Result<ProjectMetrics> {
    let handle = ProjectHandle::load(store, project_id)?;
    Ok(project_metrics(&handle.project))
}

/// Statistics for every project, in store order.
pub fn per_project(store: &dyn DocumentStore) -> Vec<NamedProjectMetrics> {
    load_projects(store)
        .iter()
        .map(|project| NamedProjectMetrics {
            nombre_proyecto: project.name.clone(),
            metrics: project_metrics(project),
        })
        .collect()
}

/// Sums over every project.
pub fn global(store: &dyn DocumentStore) -> GlobalMetrics {
    let projects = load_projects(store);
    let mut totals = GlobalMetrics {
        total_proyectos: projects.len(),
        ..Default::default()
    };
    for project in &projects {
        let tally = Tally::of(project);
        totals.total_hitos += tally.milestones;
        totals.total_pruebas += tally.tests;
        totals.total_defectos += tally.defects;
        totals.defectos_abiertos += tally.open;
        totals.defectos_cerrados += tally.closed;
        totals.total_pruebas_exitosas += tally.passed;
        totals.total_pruebas_erroneas += tally.failed;
        totals.total_pruebas_pendientes += tally.pending;
    }
    totals
}

/// Read every project, soft-failing as described in the module docs.
fn load_projects(store: &dyn DocumentStore) -> Vec<Project> {
    let docs = match store.list(PROJECTS) {
        Ok(docs) => docs,
        Err(e) => {
            error!(error = %e, "Failed to read projects for metrics");
            return Vec::new();
        }
    };

    docs.into_iter()
        .filter_map(|(id, doc)| match storage::from_document::<Project>(doc) {
            Ok(project) => Some(project),
            Err(e) => {
                warn!(project = %id, error = %e, "Skipping undecodable project");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Defect, Milestone, Slots, TestCase};
    use crate::storage::{Document, MemoryStore, SortDirection, StoreBackend};
    use crate::test_utils::insert_project;
    use crate::Error;
    use serde_json::{Value, json};

    fn defect(state: &str) -> Defect {
        Defect {
            state: state.to_string(),
            ..Default::default()
        }
    }

    fn test_case(result: &str, defects: Vec<Defect>) -> TestCase {
        TestCase {
            result: result.to_string(),
            defects: defects.into_iter().collect::<Slots<_>>(),
            ..Default::default()
        }
    }

    fn milestone(tests: Vec<TestCase>) -> Milestone {
        Milestone {
            tests: tests.into_iter().collect(),
            ..Default::default()
        }
    }

    fn project(name: &str, milestones: Vec<Milestone>) -> Project {
        Project {
            milestones,
            ..Project::new(name)
        }
    }

    #[test]
    fn test_empty_project() {
        let metrics = project_metrics(&Project::new("Vacio"));
        assert_eq!(metrics.total_hitos, 0);
        assert_eq!(metrics.total_pruebas, 0);
        assert_eq!(metrics.total_defectos, 0);
        assert!(metrics.porcentaje_pruebas_con_defectos.is_nan());

        let value = serde_json::to_value(metrics).unwrap();
        assert_eq!(value["porcentajePruebasConDefectos"], Value::Null);
    }

    #[test]
    fn test_open_and_closed_defects() {
        let p = project(
            "P",
            vec![milestone(vec![test_case(
                "",
                vec![defect("Planificado"), defect("Completado")],
            )])],
        );
        let metrics = project_metrics(&p);
        assert_eq!(metrics.total_hitos, 1);
        assert_eq!(metrics.total_pruebas, 1);
        assert_eq!(metrics.total_defectos, 2);
        assert_eq!(metrics.defectos_abiertos, 1);
        assert_eq!(metrics.defectos_cerrados, 1);
        assert_eq!(metrics.porcentaje_pruebas_con_defectos, 100.0);
    }

    #[test]
    fn test_unclassified_defects_count_only_in_total() {
        let p = project(
            "P",
            vec![milestone(vec![test_case(
                "",
                vec![defect("En proceso"), defect(""), defect("Cerrado")],
            )])],
        );
        let metrics = project_metrics(&p);
        assert_eq!(metrics.total_defectos, 3);
        assert_eq!(metrics.defectos_abiertos, 1);
        assert_eq!(metrics.defectos_cerrados, 0);
    }

    #[test]
    fn test_percentage_of_tests_with_defects() {
        let p = project(
            "P",
            vec![
                milestone(vec![
                    test_case("Exitoso", vec![]),
                    test_case("Erroneo", vec![defect("Planificado")]),
                ]),
                milestone(vec![test_case("", vec![]), test_case("", vec![])]),
            ],
        );
        let metrics = project_metrics(&p);
        assert_eq!(metrics.total_hitos, 2);
        assert_eq!(metrics.total_pruebas, 4);
        assert_eq!(metrics.porcentaje_pruebas_con_defectos, 25.0);
    }

    #[test]
    fn test_per_project_labels_by_name() {
        let mut store = MemoryStore::new();
        insert_project(&mut store, &Project::new("Alpha"));
        insert_project(
            &mut store,
            &project("Beta", vec![milestone(vec![test_case("", vec![])])]),
        );

        let list = per_project(&store);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].nombre_proyecto, "Alpha");
        assert_eq!(list[1].nombre_proyecto, "Beta");
        assert_eq!(list[1].metrics.total_pruebas, 1);

        let value = serde_json::to_value(&list[1]).unwrap();
        assert_eq!(value["nombreProyecto"], json!("Beta"));
        assert_eq!(value["totalPruebas"], json!(1));
        assert_eq!(value["porcentajePruebasConDefectos"], json!(0.0));
    }

    #[test]
    fn test_global_totals() {
        let mut store = MemoryStore::new();
        insert_project(
            &mut store,
            &project(
                "A",
                vec![milestone(vec![
                    test_case("Exitoso", vec![defect("Completado")]),
                    test_case("Erroneo", vec![defect("Planificado")]),
                ])],
            ),
        );
        insert_project(
            &mut store,
            &project("B", vec![milestone(vec![test_case("", vec![])]), milestone(vec![])]),
        );

        let totals = global(&store);
        assert_eq!(
            totals,
            GlobalMetrics {
                total_proyectos: 2,
                total_hitos: 3,
                total_pruebas: 3,
                total_defectos: 2,
                defectos_abiertos: 1,
                defectos_cerrados: 1,
                total_pruebas_exitosas: 1,
                total_pruebas_erroneas: 1,
                total_pruebas_pendientes: 1,
            }
        );
        let value = serde_json::to_value(totals).unwrap();
        assert!(value.get("porcentajePruebasConDefectos").is_none());
        assert_eq!(value["totalPruebasPendientes"], json!(1));
    }

    #[test]
    fn test_global_over_no_projects() {
        let store = MemoryStore::new();
        assert_eq!(global(&store), GlobalMetrics::default());
        assert!(per_project(&store).is_empty());
    }

    #[test]
    fn test_single_missing_project() {
        let store = MemoryStore::new();
        let err = single(&store, "nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_undecodable_project_is_skipped() {
        let mut store = MemoryStore::new();
        insert_project(&mut store, &Project::new("Good"));
        let mut bad = Document::new();
        bad.insert("Hito".into(), json!([{"Prueba": 42}]));
        store.add(PROJECTS, bad).unwrap();

        let totals = global(&store);
        assert_eq!(totals.total_proyectos, 1);
    }

    /// A store whose reads always fail.
    struct BrokenStore;

    impl DocumentStore for BrokenStore {
        fn get(&self, _: &str, _: &str) -> Result<Option<Document>> {
            Err(Error::Other("unreachable".into()))
        }
        fn list(&self, _: &str) -> Result<Vec<(String, Document)>> {
            Err(Error::Other("unreachable".into()))
        }
        fn list_ordered(
            &self,
            _: &str,
            _: &str,
            _: SortDirection,
        ) -> Result<Vec<(String, Document)>> {
            Err(Error::Other("unreachable".into()))
        }
        fn add(&mut self, _: &str, _: Document) -> Result<String> {
            Err(Error::Other("unreachable".into()))
        }
        fn create(&mut self, _: &str, _: &str, _: Document) -> Result<()> {
            Err(Error::Other("unreachable".into()))
        }
        fn set(&mut self, _: &str, _: &str, _: Document) -> Result<()> {
            Err(Error::Other("unreachable".into()))
        }
        fn update(&mut self, _: &str, _: &str, _: Document) -> Result<()> {
            Err(Error::Other("unreachable".into()))
        }
        fn array_union(&mut self, _: &str, _: &str, _: &str, _: Vec<Value>) -> Result<()> {
            Err(Error::Other("unreachable".into()))
        }
        fn array_append(&mut self, _: &str, _: &str, _: &str, _: Vec<Value>) -> Result<()> {
            Err(Error::Other("unreachable".into()))
        }
        fn delete(&mut self, _: &str, _: &str) -> Result<bool> {
            Err(Error::Other("unreachable".into()))
        }
        fn location(&self) -> String {
            "broken".into()
        }
        fn backend_type(&self) -> StoreBackend {
            StoreBackend::Memory
        }
    }

    #[test]
    fn test_read_failure_yields_zeros() {
        assert_eq!(global(&BrokenStore), GlobalMetrics::default());
        assert!(per_project(&BrokenStore).is_empty());
        assert!(single(&BrokenStore, "x").is_err());
    }
}

//! Nested-path resolution inside project documents.
//!
//! Milestones, tests and defects have no documents of their own. They are
//! addressed by a project id plus a chain of indices:
//!
//! ```text
//! proyectos/<id> -> Hito[<milestone>] -> Prueba[<test>] -> Defecto[<defect>]
//! ```
//!
//! The milestone index is a position in the `Hito` array. Test and defect
//! indices are keys in their `Slots` container.
//!
//! Every edit below the milestone level is a read-modify-write of the
//! project's whole `Hito` field. Callers hold the store lock for the whole
//! operation, which serializes edits inside one process; separate processes
//! sharing a database can still overwrite each other (last write wins).
//! Milestone appends use the store's atomic array append, which keeps
//! duplicates. Resource appends use its atomic array union.

use crate::models::{Defect, Milestone, Project, Resource, TestCase};
use crate::storage::{self, Document, DocumentStore, PROJECTS};
use crate::{Error, Result};
use tracing::debug;

pub const PROJECT_NOT_FOUND: &str = "Proyecto no encontrado";
pub const MILESTONE_NOT_FOUND: &str = "Hito no encontrado en el índice especificado";
pub const TEST_NOT_FOUND: &str = "Prueba no encontrada en el índice especificado";
pub const DEFECT_NOT_FOUND: &str = "Defecto no encontrado en el índice especificado";

/// A project loaded from the store, with the id needed to write it back.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    pub id: String,
    pub project: Project,
}

impl ProjectHandle {
    /// Load a project, failing with `NotFound` if it does not exist.
    pub fn load(store: &dyn DocumentStore, id: &str) -> Result<Self> {
        let doc = store
            .get(PROJECTS, id)?
            .ok_or_else(|| Error::NotFound(PROJECT_NOT_FOUND.to_string()))?;
        Ok(Self {
            id: id.to_string(),
            project: storage::from_document(doc)?,
        })
    }

    /// Resolve `Hito[index]`.
    pub fn milestone(&self, index: &str) -> Result<&Milestone> {
        parse_position(index)
            .and_then(|i| self.project.milestones.get(i))
            .ok_or_else(|| Error::NotFound(MILESTONE_NOT_FOUND.to_string()))
    }

    /// Resolve `Hito[index]` for mutation.
    pub fn milestone_mut(&mut self, index: &str) -> Result<&mut Milestone> {
        parse_position(index)
            .and_then(|i| self.project.milestones.get_mut(i))
            .ok_or_else(|| Error::NotFound(MILESTONE_NOT_FOUND.to_string()))
    }

    /// Resolve `Hito[milestone].Prueba[test]`.
    pub fn test(&self, milestone: &str, test: &str) -> Result<&TestCase> {
        self.milestone(milestone)?
            .tests
            .get(test)
            .ok_or_else(|| Error::NotFound(TEST_NOT_FOUND.to_string()))
    }

    /// Resolve `Hito[milestone].Prueba[test]` for mutation.
    pub fn test_mut(&mut self, milestone: &str, test: &str) -> Result<&mut TestCase> {
        self.milestone_mut(milestone)?
            .tests
            .get_mut(test)
            .ok_or_else(|| Error::NotFound(TEST_NOT_FOUND.to_string()))
    }

    /// Write the `Hito` field back as a single field replacement.
    pub fn save_milestones(&self, store: &mut dyn DocumentStore) -> Result<()> {
        let mut fields = Document::new();
        fields.insert(
            "Hito".to_string(),
            serde_json::to_value(&self.project.milestones)?,
        );
        store.update(PROJECTS, &self.id, fields)
    }
}

/// Parse a milestone index path segment.
///
/// Only canonical decimal integers address a position: `"1"` does, `"01"`
/// and `"+1"` do not.
pub fn parse_position(raw: &str) -> Option<usize> {
    raw.parse::<usize>()
        .ok()
        .filter(|n| n.to_string() == raw)
}

/// Append a new milestone (defaults applied). Identical milestones are
/// each kept.
pub fn add_milestone(
    store: &mut dyn DocumentStore,
    project_id: &str,
    draft: Milestone,
) -> Result<()> {
    let milestone = serde_json::to_value(Milestone::created_from(draft))?;
    store
        .array_append(PROJECTS, project_id, "Hito", vec![milestone])
        .map_err(project_not_found)
}

/// Replace `Hito[index]` wholesale with `milestone`.
pub fn replace_milestone(
    store: &mut dyn DocumentStore,
    project_id: &str,
    index: &str,
    milestone: Milestone,
) -> Result<()> {
    let mut handle = ProjectHandle::load(store, project_id)?;
    *handle.milestone_mut(index)? = milestone;
    handle.save_milestones(store)
}

/// Remove `Hito[index]`; later milestones shift down by one.
pub fn delete_milestone(
    store: &mut dyn DocumentStore,
    project_id: &str,
    index: &str,
) -> Result<Milestone> {
    let mut handle = ProjectHandle::load(store, project_id)?;
    let position = parse_position(index)
        .filter(|&i| i < handle.project.milestones.len())
        .ok_or_else(|| Error::NotFound(MILESTONE_NOT_FOUND.to_string()))?;
    let removed = handle.project.milestones.remove(position);
    handle.save_milestones(store)?;
    Ok(removed)
}

/// Add a test (defaults applied) to `Hito[index]` and return its key.
pub fn add_test(
    store: &mut dyn DocumentStore,
    project_id: &str,
    index: &str,
    draft: TestCase,
) -> Result<String> {
    let mut handle = ProjectHandle::load(store, project_id)?;
    let key = handle
        .milestone_mut(index)?
        .tests
        .push(TestCase::created_from(draft));
    debug!(project = project_id, milestone = index, key = %key, "Adding test");
    handle.save_milestones(store)?;
    Ok(key)
}

/// Replace `Hito[index].Prueba[key]` wholesale with `test`.
pub fn replace_test(
    store: &mut dyn DocumentStore,
    project_id: &str,
    index: &str,
    key: &str,
    test: TestCase,
) -> Result<()> {
    let mut handle = ProjectHandle::load(store, project_id)?;
    *handle.test_mut(index, key)? = test;
    handle.save_milestones(store)
}

/// Remove `Hito[index].Prueba[key]`; other test keys are unchanged.
pub fn delete_test(
    store: &mut dyn DocumentStore,
    project_id: &str,
    index: &str,
    key: &str,
) -> Result<TestCase> {
    let mut handle = ProjectHandle::load(store, project_id)?;
    let removed = handle
        .milestone_mut(index)?
        .tests
        .remove(key)
        .ok_or_else(|| Error::NotFound(TEST_NOT_FOUND.to_string()))?;
    handle.save_milestones(store)?;
    Ok(removed)
}

/// Fetch `Hito[index].Prueba[key]`, defects included.
pub fn get_test(
    store: &dyn DocumentStore,
    project_id: &str,
    index: &str,
    key: &str,
) -> Result<TestCase> {
    let handle = ProjectHandle::load(store, project_id)?;
    Ok(handle.test(index, key)?.clone())
}

/// Add a defect (defaults applied) to a test and return its key.
pub fn add_defect(
    store: &mut dyn DocumentStore,
    project_id: &str,
    index: &str,
    test_key: &str,
    draft: Defect,
) -> Result<String> {
    let mut handle = ProjectHandle::load(store, project_id)?;
    let key = handle
        .test_mut(index, test_key)?
        .defects
        .push(Defect::created_from(draft));
    debug!(
        project = project_id,
        milestone = index,
        test = test_key,
        key = %key,
        "Adding defect"
    );
    handle.save_milestones(store)?;
    Ok(key)
}

/// Remove a defect; other defect keys are unchanged.
pub fn delete_defect(
    store: &mut dyn DocumentStore,
    project_id: &str,
    index: &str,
    test_key: &str,
    defect_key: &str,
) -> Result<Defect> {
    let mut handle = ProjectHandle::load(store, project_id)?;
    let removed = handle
        .test_mut(index, test_key)?
        .defects
        .remove(defect_key)
        .ok_or_else(|| Error::NotFound(DEFECT_NOT_FOUND.to_string()))?;
    handle.save_milestones(store)?;
    Ok(removed)
}

/// Append a new resource (defaults applied) with an array union.
pub fn add_resource(
    store: &mut dyn DocumentStore,
    project_id: &str,
    draft: Resource,
) -> Result<()> {
    let resource = serde_json::to_value(Resource::created_from(draft))?;
    store
        .array_union(PROJECTS, project_id, "Recurso", vec![resource])
        .map_err(project_not_found)
}

/// List a project's resources.
pub fn list_resources(store: &dyn DocumentStore, project_id: &str) -> Result<Vec<Resource>> {
    Ok(ProjectHandle::load(store, project_id)?.project.resources)
}

fn project_not_found(e: Error) -> Error {
    match e {
        Error::NotFound(_) => Error::NotFound(PROJECT_NOT_FOUND.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STATE_COMPLETED;
    use crate::storage::MemoryStore;
    use crate::test_utils::insert_project;
    use serde_json::Value;

    fn store_with_project() -> (MemoryStore, String) {
        let mut store = MemoryStore::new();
        let id = insert_project(&mut store, &Project::new("Portal"));
        (store, id)
    }

    fn named_milestone(name: &str) -> Milestone {
        Milestone {
            description: name.to_string(),
            ..Default::default()
        }
    }

    fn descriptions(store: &MemoryStore, id: &str) -> Vec<String> {
        ProjectHandle::load(store, id)
            .unwrap()
            .project
            .milestones
            .into_iter()
            .map(|m| m.description)
            .collect()
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("0"), Some(0));
        assert_eq!(parse_position("12"), Some(12));
        assert_eq!(parse_position("01"), None);
        assert_eq!(parse_position("+1"), None);
        assert_eq!(parse_position("-1"), None);
        assert_eq!(parse_position("abc"), None);
    }

    #[test]
    fn test_missing_project_is_not_found() {
        let mut store = MemoryStore::new();
        let err = add_test(&mut store, "nope", "0", TestCase::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == PROJECT_NOT_FOUND));

        let err = add_milestone(&mut store, "nope", Milestone::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == PROJECT_NOT_FOUND));

        // Checked before the (invalid) index is looked at.
        let err = delete_defect(&mut store, "nope", "x", "y", "z").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == PROJECT_NOT_FOUND));
    }

    #[test]
    fn test_append_two_milestones_keeps_order() {
        let (mut store, id) = store_with_project();
        add_milestone(&mut store, &id, named_milestone("Fase 1")).unwrap();
        add_milestone(&mut store, &id, named_milestone("Fase 2")).unwrap();

        assert_eq!(descriptions(&store, &id), vec!["Fase 1", "Fase 2"]);
    }

    #[test]
    fn test_identical_milestones_are_both_kept() {
        let (mut store, id) = store_with_project();
        add_milestone(&mut store, &id, Milestone::default()).unwrap();
        add_milestone(&mut store, &id, Milestone::default()).unwrap();

        assert_eq!(descriptions(&store, &id), vec!["Nuevo hito", "Nuevo hito"]);
    }

    #[test]
    fn test_delete_milestone_shifts_indices() {
        let (mut store, id) = store_with_project();
        add_milestone(&mut store, &id, named_milestone("Fase 1")).unwrap();
        add_milestone(&mut store, &id, named_milestone("Fase 2")).unwrap();

        let removed = delete_milestone(&mut store, &id, "0").unwrap();
        assert_eq!(removed.description, "Fase 1");
        assert_eq!(descriptions(&store, &id), vec!["Fase 2"]);

        let err = delete_milestone(&mut store, &id, "1").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == MILESTONE_NOT_FOUND));
    }

    #[test]
    fn test_replace_milestone() {
        let (mut store, id) = store_with_project();
        add_milestone(&mut store, &id, named_milestone("Fase 1")).unwrap();
        replace_milestone(&mut store, &id, "0", named_milestone("Renombrada")).unwrap();

        assert_eq!(descriptions(&store, &id), vec!["Renombrada"]);
        let err = replace_milestone(&mut store, &id, "5", Milestone::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == MILESTONE_NOT_FOUND));
    }

    #[test]
    fn test_add_test_assigns_sequential_keys() {
        let (mut store, id) = store_with_project();
        add_milestone(&mut store, &id, Milestone::default()).unwrap();

        assert_eq!(add_test(&mut store, &id, "0", TestCase::default()).unwrap(), "0");
        assert_eq!(add_test(&mut store, &id, "0", TestCase::default()).unwrap(), "1");

        let test = get_test(&store, &id, "0", "1").unwrap();
        assert_eq!(test.name, "Nueva prueba");
    }

    #[test]
    fn test_add_test_to_missing_milestone() {
        let (mut store, id) = store_with_project();
        let err = add_test(&mut store, &id, "0", TestCase::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == MILESTONE_NOT_FOUND));
    }

    #[test]
    fn test_replace_and_delete_test() {
        let (mut store, id) = store_with_project();
        add_milestone(&mut store, &id, Milestone::default()).unwrap();
        add_test(&mut store, &id, "0", TestCase::default()).unwrap();
        add_test(&mut store, &id, "0", TestCase::default()).unwrap();

        let replacement = TestCase {
            name: "Login".to_string(),
            result: "Exitoso".to_string(),
            ..Default::default()
        };
        replace_test(&mut store, &id, "0", "1", replacement).unwrap();
        assert_eq!(get_test(&store, &id, "0", "1").unwrap().name, "Login");

        let err = replace_test(&mut store, &id, "0", "7", TestCase::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == TEST_NOT_FOUND));

        delete_test(&mut store, &id, "0", "0").unwrap();
        // Key "1" keeps its key after "0" is gone.
        assert_eq!(get_test(&store, &id, "0", "1").unwrap().name, "Login");
        assert!(get_test(&store, &id, "0", "0").is_err());

        // New tests never reuse a surviving key.
        assert_eq!(add_test(&mut store, &id, "0", TestCase::default()).unwrap(), "2");
    }

    #[test]
    fn test_defect_lifecycle() {
        let (mut store, id) = store_with_project();
        add_milestone(&mut store, &id, Milestone::default()).unwrap();
        add_test(&mut store, &id, "0", TestCase::default()).unwrap();

        let draft = Defect {
            name: "Timeout".to_string(),
            state: STATE_COMPLETED.to_string(),
            ..Default::default()
        };
        assert_eq!(add_defect(&mut store, &id, "0", "0", draft).unwrap(), "0");
        assert_eq!(add_defect(&mut store, &id, "0", "0", Defect::default()).unwrap(), "1");

        let test = get_test(&store, &id, "0", "0").unwrap();
        assert_eq!(test.defects.len(), 2);
        assert_eq!(test.defects.get("0").unwrap().name, "Timeout");

        let removed = delete_defect(&mut store, &id, "0", "0", "0").unwrap();
        assert_eq!(removed.name, "Timeout");
        let err = delete_defect(&mut store, &id, "0", "0", "0").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == DEFECT_NOT_FOUND));

        let err = add_defect(&mut store, &id, "0", "9", Defect::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == TEST_NOT_FOUND));
    }

    #[test]
    fn test_resources() {
        let (mut store, id) = store_with_project();
        add_resource(
            &mut store,
            &id,
            Resource {
                name: "Ana".to_string(),
                role: "QA".to_string(),
            },
        )
        .unwrap();
        add_resource(&mut store, &id, Resource::default()).unwrap();

        let resources = list_resources(&store, &id).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].name, "Ana");
        assert_eq!(resources[1].role, "Sin asignar");

        let err = list_resources(&store, "nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_nested_edit_preserves_other_project_fields() {
        let mut store = MemoryStore::new();
        let mut project = Project::new("Portal");
        project.extra.insert("Cliente".into(), Value::String("ACME".into()));
        let id = insert_project(&mut store, &project);

        add_milestone(&mut store, &id, Milestone::default()).unwrap();
        add_test(&mut store, &id, "0", TestCase::default()).unwrap();

        let doc = store.get(PROJECTS, &id).unwrap().unwrap();
        assert_eq!(doc["Cliente"], Value::String("ACME".into()));
        assert_eq!(doc["Proyecto"], Value::String("Portal".into()));
    }
}

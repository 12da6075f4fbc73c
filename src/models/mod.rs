//! Data models for qatrack documents.
//!
//! Two unrelated families of documents live in the store:
//! - `Project` - the tracking tree: milestones (`Hito`) containing tests
//!   (`Prueba`) containing defects (`Defecto`), plus resources (`Recurso`)
//! - `Task` / `User` - a small standalone task tracker
//!
//! Project-tree field names are the Spanish names used on the wire and in
//! stored documents. Unknown fields sent by clients are carried through
//! untouched in each struct's `extra` map.

pub mod slots;

pub use slots::Slots;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Milestone and defect state: planned.
pub const STATE_PLANNED: &str = "Planificado";
/// Milestone and defect state: in progress.
pub const STATE_IN_PROGRESS: &str = "En proceso";
/// Milestone and defect state: completed.
pub const STATE_COMPLETED: &str = "Completado";

/// Test result: passed.
pub const RESULT_PASSED: &str = "Exitoso";
/// Test result: failed.
pub const RESULT_FAILED: &str = "Erroneo";

/// A tracked project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Display name
    #[serde(rename = "Proyecto", default, deserialize_with = "lenient_string")]
    pub name: String,

    /// Milestones, addressed by position
    #[serde(rename = "Hito", default, deserialize_with = "lenient_list")]
    pub milestones: Vec<Milestone>,

    /// People assigned to the project
    #[serde(rename = "Recurso", default, deserialize_with = "lenient_list")]
    pub resources: Vec<Resource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    /// Create an empty project with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A project phase (`Hito`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(rename = "Descripcion", default, deserialize_with = "lenient_string")]
    pub description: String,

    #[serde(rename = "Propietario", default, deserialize_with = "lenient_string")]
    pub owner: String,

    #[serde(rename = "Fecha_inicio", default, deserialize_with = "lenient_string")]
    pub start_date: String,

    #[serde(rename = "Fecha_fin", default, deserialize_with = "lenient_string")]
    pub end_date: String,

    #[serde(rename = "Estado", default, deserialize_with = "lenient_string")]
    pub state: String,

    /// Completion percentage; clients send either a number or a string
    #[serde(rename = "Porcentaje", default)]
    pub percentage: Value,

    #[serde(rename = "Prueba", default)]
    pub tests: Slots<TestCase>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Milestone {
    /// Build a new milestone from a request body, filling in defaults.
    ///
    /// Only the known fields are taken from the body; the new milestone
    /// always starts without tests.
    pub fn created_from(draft: Milestone) -> Self {
        Self {
            description: or_default(draft.description, "Nuevo hito"),
            owner: or_default(draft.owner, "Sin asignar"),
            start_date: draft.start_date,
            end_date: draft.end_date,
            state: or_default(draft.state, STATE_PLANNED),
            percentage: if is_truthy(&draft.percentage) {
                draft.percentage
            } else {
                Value::String(String::new())
            },
            tests: Slots::new(),
            extra: Map::new(),
        }
    }
}

/// A test case inside a milestone (`Prueba`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "Nombre", default, deserialize_with = "lenient_string")]
    pub name: String,

    #[serde(rename = "Estado", default, deserialize_with = "lenient_string")]
    pub state: String,

    #[serde(rename = "Propietario", default, deserialize_with = "lenient_string")]
    pub owner: String,

    #[serde(rename = "Fecha_inicio", default, deserialize_with = "lenient_string")]
    pub start_date: String,

    #[serde(rename = "Fecha_fin", default, deserialize_with = "lenient_string")]
    pub end_date: String,

    #[serde(rename = "Comentario", default, deserialize_with = "lenient_string")]
    pub comment: String,

    #[serde(rename = "Archivo_adjunto", default, deserialize_with = "lenient_string")]
    pub attachment: String,

    #[serde(rename = "Criterio_aceptacion", default, deserialize_with = "lenient_string")]
    pub acceptance_criteria: String,

    /// `Exitoso`, `Erroneo`, or anything else for pending
    #[serde(rename = "Resultado", default, deserialize_with = "lenient_string")]
    pub result: String,

    #[serde(rename = "Defecto", default)]
    pub defects: Slots<Defect>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestCase {
    /// Build a new test case from a request body, filling in defaults.
    ///
    /// Defects supplied in the body are kept.
    pub fn created_from(draft: TestCase) -> Self {
        Self {
            name: or_default(draft.name, "Nueva prueba"),
            state: or_default(draft.state, STATE_PLANNED),
            owner: draft.owner,
            start_date: draft.start_date,
            end_date: draft.end_date,
            comment: or_default(draft.comment, STATE_PLANNED),
            attachment: draft.attachment,
            acceptance_criteria: draft.acceptance_criteria,
            result: draft.result,
            defects: draft.defects,
            extra: Map::new(),
        }
    }

    /// Classify this test's `Resultado`.
    pub fn outcome(&self) -> TestOutcome {
        TestOutcome::classify(&self.result)
    }
}

/// A recorded defect inside a test case (`Defecto`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    #[serde(rename = "Nombre", default, deserialize_with = "lenient_string")]
    pub name: String,

    #[serde(rename = "Propietario", default, deserialize_with = "lenient_string")]
    pub owner: String,

    #[serde(rename = "Estado", default, deserialize_with = "lenient_string")]
    pub state: String,

    #[serde(rename = "Resolucion", default, deserialize_with = "lenient_string")]
    pub resolution: String,

    #[serde(rename = "Resuelto", default, deserialize_with = "lenient_string")]
    pub resolved: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Defect {
    /// Build a new defect from a request body, filling in defaults.
    pub fn created_from(draft: Defect) -> Self {
        Self {
            name: or_default(draft.name, "Nuevo defecto"),
            owner: or_default(draft.owner, STATE_PLANNED),
            state: draft.state,
            resolution: draft.resolution,
            resolved: draft.resolved,
            extra: Map::new(),
        }
    }

    /// Classify this defect's `Estado`.
    pub fn status(&self) -> DefectStatus {
        DefectStatus::classify(&self.state)
    }
}

/// A role assignment on a project (`Recurso`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Nombre", default, deserialize_with = "lenient_string")]
    pub name: String,

    #[serde(rename = "Rol", default, deserialize_with = "lenient_string")]
    pub role: String,
}

impl Resource {
    /// Build a new resource from a request body, filling in defaults.
    pub fn created_from(draft: Resource) -> Self {
        Self {
            name: or_default(draft.name, "Recurso"),
            role: or_default(draft.role, "Sin asignar"),
        }
    }
}

/// How a defect counts toward metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectStatus {
    /// `Planificado` or `En proceso`
    Open,
    /// `Completado`
    Closed,
    /// Any other value; counted in neither bucket
    Unclassified,
}

impl DefectStatus {
    /// Classify a raw `Estado` value.
    pub fn classify(state: &str) -> Self {
        match state {
            STATE_PLANNED | STATE_IN_PROGRESS => Self::Open,
            STATE_COMPLETED => Self::Closed,
            _ => Self::Unclassified,
        }
    }
}

/// How a test counts toward metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
    /// Everything that is not a recognised result, including `""`
    Pending,
}

impl TestOutcome {
    /// Classify a raw `Resultado` value.
    pub fn classify(result: &str) -> Self {
        match result {
            RESULT_PASSED => Self::Passed,
            RESULT_FAILED => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Task status in the standalone tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Parse a status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A work item in the standalone tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Email of the owning user
    pub user: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(rename = "dateCreated")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "dateUpdated")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(user: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user: user.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A tracker user, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,

    #[serde(rename = "dateCreated")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Profile written alongside an identity record at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub email: String,

    #[serde(rename = "dateCreated")]
    pub created_at: DateTime<Utc>,
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// JavaScript-style truthiness, which is how stored defaults were decided.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Accept strings, numbers, booleans and null for a text field.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Accept an array or null for a list field.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

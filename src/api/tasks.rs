//! Task tracker endpoints. Every route here sits behind the bearer-token guard.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::error::{ApiResult, json_body};
use super::server::AppState;
use crate::Error;
use crate::storage::{self, SortDirection, TASKS};
use crate::validation::{NewTask, TaskUpdate, Validate};

const TASK_NOT_FOUND: &str = "Task not found";

/// Query string accepted by `GET /tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    /// Only tasks owned by this email
    pub user: Option<String>,
}

/// `GET /tasks` - newest first
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<Value>>> {
    let store = state.store.lock().await;
    let tasks: Vec<Value> = store
        .list_ordered(TASKS, "dateCreated", SortDirection::Descending)?
        .into_iter()
        .filter(|(_, doc)| match filter.user.as_deref() {
            Some(user) => doc.get("user").and_then(Value::as_str) == Some(user),
            None => true,
        })
        .map(|(id, doc)| storage::with_id(&id, doc))
        .collect();
    debug!(count = tasks.len(), "Listed tasks");
    Ok(Json(tasks))
}

/// `POST /tasks`
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let draft = json_body(body)?;
    draft.validate().map_err(Error::Validation)?;

    let task = draft.into_task();
    let mut store = state.store.lock().await;
    let id = store.add(TASKS, storage::to_document(&task)?)?;
    info!(task = %id, user = %task.user, "Created task");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// `GET /tasks/:task_id`
pub async fn get(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    let doc = store
        .get(TASKS, &task_id)?
        .ok_or_else(|| Error::NotFound(TASK_NOT_FOUND.to_string()))?;
    Ok(Json(storage::with_id(&task_id, doc)))
}

/// `PUT /tasks/:task_id` - merge the supplied fields
pub async fn update(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Result<Json<TaskUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let changes = json_body(body)?;
    changes.validate().map_err(Error::Validation)?;

    let mut store = state.store.lock().await;
    store
        .update(TASKS, &task_id, changes.into_fields())
        .map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(TASK_NOT_FOUND.to_string()),
            other => other,
        })?;
    Ok(Json(json!({ "message": "Task updated successfully" })))
}

/// `DELETE /tasks/:task_id`
pub async fn delete(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut store = state.store.lock().await;
    if !store.delete(TASKS, &task_id)? {
        return Err(Error::NotFound(TASK_NOT_FOUND.to_string()).into());
    }
    info!(task = %task_id, "Deleted task");
    Ok(StatusCode::NO_CONTENT)
}

//! Milestone, test and defect handlers.
//!
//! All of these address a node inside a project document by index; see
//! [`crate::nested`] for how the indices are resolved.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::{Value, json};
use tracing::info;

use super::error::{ApiResult, json_body};
use super::server::AppState;
use crate::models::{Defect, Milestone, TestCase};
use crate::nested;

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

/// `POST /api/proyectos/:id/hito`
pub async fn add_milestone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Milestone>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let draft = json_body(body)?;
    let mut store = state.store.lock().await;
    nested::add_milestone(&mut **store, &id, draft)?;
    Ok(message("Hito agregado correctamente al proyecto"))
}

/// `PUT /api/proyectos/:id/hito/:milestone` - replace the milestone with the body
pub async fn replace_milestone(
    State(state): State<AppState>,
    Path((id, milestone)): Path<(String, String)>,
    body: Result<Json<Milestone>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let replacement = json_body(body)?;
    let mut store = state.store.lock().await;
    nested::replace_milestone(&mut **store, &id, &milestone, replacement)?;
    Ok(message("Hito actualizado correctamente"))
}

/// `DELETE /api/proyectos/:id/hito/:milestone`
pub async fn delete_milestone(
    State(state): State<AppState>,
    Path((id, milestone)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let mut store = state.store.lock().await;
    let removed = nested::delete_milestone(&mut **store, &id, &milestone)?;
    info!(
        project = %id,
        milestone = %milestone,
        description = %removed.description,
        "Deleted milestone"
    );
    Ok(message("Hito eliminado correctamente"))
}

/// `POST /api/proyectos/:id/hito/:milestone/prueba`
pub async fn add_test(
    State(state): State<AppState>,
    Path((id, milestone)): Path<(String, String)>,
    body: Result<Json<TestCase>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let draft = json_body(body)?;
    let mut store = state.store.lock().await;
    let key = nested::add_test(&mut **store, &id, &milestone, draft)?;
    Ok(Json(json!({
        "message": "Prueba agregada correctamente al proyecto",
        "id": key,
    })))
}

/// `PUT /api/proyectos/:id/hito/:milestone/prueba/:test`
pub async fn replace_test(
    State(state): State<AppState>,
    Path((id, milestone, test)): Path<(String, String, String)>,
    body: Result<Json<TestCase>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let replacement = json_body(body)?;
    let mut store = state.store.lock().await;
    nested::replace_test(&mut **store, &id, &milestone, &test, replacement)?;
    Ok(message("Prueba actualizada correctamente"))
}

/// `DELETE /api/proyectos/:id/hito/:milestone/prueba/:test`
pub async fn delete_test(
    State(state): State<AppState>,
    Path((id, milestone, test)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let mut store = state.store.lock().await;
    nested::delete_test(&mut **store, &id, &milestone, &test)?;
    info!(project = %id, milestone = %milestone, test = %test, "Deleted test");
    Ok(message("Prueba eliminado correctamente"))
}

/// `GET /api/proyectos/:id/hito/:milestone/prueba/:test/defecto`
pub async fn list_defects(
    State(state): State<AppState>,
    Path((id, milestone, test)): Path<(String, String, String)>,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    let prueba = nested::get_test(&**store, &id, &milestone, &test)?;
    Ok(Json(json!({
        "defectos": &prueba.defects,
        "prueba": &prueba,
    })))
}

/// `POST /api/proyectos/:id/hito/:milestone/prueba/:test/defecto`
pub async fn add_defect(
    State(state): State<AppState>,
    Path((id, milestone, test)): Path<(String, String, String)>,
    body: Result<Json<Defect>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let draft = json_body(body)?;
    let mut store = state.store.lock().await;
    let key = nested::add_defect(&mut **store, &id, &milestone, &test, draft)?;
    Ok(Json(json!({
        "message": "Defecto agregado correctamente al proyecto",
        "id": key,
    })))
}

/// `DELETE /api/proyectos/:id/hito/:milestone/prueba/:test/defecto/:defect`
pub async fn delete_defect(
    State(state): State<AppState>,
    Path((id, milestone, test, defect)): Path<(String, String, String, String)>,
) -> ApiResult<Json<Value>> {
    let mut store = state.store.lock().await;
    nested::delete_defect(&mut **store, &id, &milestone, &test, &defect)?;
    Ok(message("Defecto eliminado correctamente"))
}

//! Project documents and their resources.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::info;

use super::error::{ApiError, ApiResult, json_body};
use super::server::AppState;
use crate::Error;
use crate::models::Resource;
use crate::nested::{self, PROJECT_NOT_FOUND, ProjectHandle};
use crate::storage::{self, Document, PROJECTS};

/// `GET /api/proyectos` and `GET /api/recursos`
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Value>>> {
    let store = state.store.lock().await;
    let projects = store
        .list(PROJECTS)?
        .into_iter()
        .map(|(id, doc)| storage::with_id(&id, doc))
        .collect();
    Ok(Json(projects))
}

/// `POST /api/proyectos` - store the body as a new project
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let doc = object_body(json_body(body)?)?;
    let mut store = state.store.lock().await;
    let id = store.add(PROJECTS, doc)?;
    info!(project = %id, "Created project");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// `GET /api/proyectos/:id`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    let doc = store
        .get(PROJECTS, &id)?
        .ok_or_else(|| Error::NotFound(PROJECT_NOT_FOUND.to_string()))?;
    Ok(Json(storage::with_id(&id, doc)))
}

/// `PUT /api/proyectos/:id` - merge the body's top-level fields
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let fields = object_body(json_body(body)?)?;
    let mut store = state.store.lock().await;
    store.update(PROJECTS, &id, fields).map_err(|e| match e {
        Error::NotFound(_) => Error::NotFound(PROJECT_NOT_FOUND.to_string()),
        other => other,
    })?;
    Ok(Json(
        json!({ "message": "El documento se actualizo correctamente" }),
    ))
}

/// `DELETE /api/proyectos/:id` - succeeds whether or not the project exists
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut store = state.store.lock().await;
    if store.delete(PROJECTS, &id)? {
        info!(project = %id, "Deleted project");
    }
    Ok(Json(json!({ "message": "Proyecto eliminado correctamente" })))
}

/// `GET /api/proyectos/:id/prueba` - project name plus its milestone tree
pub async fn milestone_overview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    let handle = ProjectHandle::load(&**store, &id)?;
    Ok(Json(json!({
        "proyecto": handle.project.name,
        "hitos": handle.project.milestones,
    })))
}

/// `GET /api/proyectos/:id/recurso`
pub async fn list_resources(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Resource>>> {
    let store = state.store.lock().await;
    Ok(Json(nested::list_resources(&**store, &id)?))
}

/// `POST /api/proyectos/:id/recurso`
pub async fn add_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Resource>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let draft = json_body(body)?;
    let mut store = state.store.lock().await;
    nested::add_resource(&mut **store, &id, draft)?;
    Ok(Json(
        json!({ "message": "Recurso agregado correctamente al proyecto" }),
    ))
}

/// Require a JSON object body; the client-sent `id` is never stored.
fn object_body(value: Value) -> ApiResult<Document> {
    match value {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        _ => Err(ApiError::message(
            StatusCode::BAD_REQUEST,
            "El cuerpo debe ser un objeto JSON",
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::test_utils::{memory_state, send};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_project_crud() {
        let app = router(memory_state());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/proyectos",
            Some(json!({"Proyecto": "Portal", "Hito": [], "Cliente": "ACME"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();
        let uri = format!("/api/proyectos/{}", id);

        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!(id));
        assert_eq!(body["Cliente"], json!("ACME"));

        let (status, _) = send(
            &app,
            Method::PUT,
            &uri,
            Some(json!({"Proyecto": "Portal 2"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(body["Proyecto"], json!("Portal 2"));
        assert_eq!(body["Cliente"], json!("ACME"));

        let (_, list) = send(&app, Method::GET, "/api/proyectos", None, None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Proyecto no encontrado"));
    }

    #[tokio::test]
    async fn test_update_missing_project() {
        let app = router(memory_state());
        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/proyectos/nope",
            Some(json!({"Proyecto": "X"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], json!("Proyecto no encontrado"));
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let app = router(memory_state());
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/proyectos",
            Some(json!([1, 2])),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resources() {
        let app = router(memory_state());
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/proyectos",
            Some(json!({"Proyecto": "Portal"})),
            None,
        )
        .await;
        let id = body["id"].as_str().unwrap().to_string();
        let uri = format!("/api/proyectos/{}/recurso", id);

        let (status, _) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({"Nombre": "Ana", "Rol": "QA"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::POST, &uri, Some(json!({})), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{"Nombre": "Ana", "Rol": "QA"}, {"Nombre": "Recurso", "Rol": "Sin asignar"}])
        );

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/proyectos/nope/recurso",
            Some(json!({})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, all) = send(&app, Method::GET, "/api/recursos", None, None).await;
        assert_eq!(all[0]["Recurso"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_milestone_overview() {
        let app = router(memory_state());
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/proyectos",
            Some(json!({"Proyecto": "Portal"})),
            None,
        )
        .await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/proyectos/{}/prueba", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"proyecto": "Portal", "hitos": []}));

        let (status, _) = send(&app, Method::GET, "/api/proyectos/nope/prueba", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

//! Metrics endpoints.

use axum::{
    Json,
    extract::{Path, State},
};

use super::error::ApiResult;
use super::server::AppState;
use crate::metrics::{self, GlobalMetrics, NamedProjectMetrics, ProjectMetrics};

/// `GET /api/proyecto/metricas`
pub async fn per_project(State(state): State<AppState>) -> Json<Vec<NamedProjectMetrics>> {
    let store = state.store.lock().await;
    Json(metrics::per_project(&**store))
}

/// `GET /api/proyecto/metricas/all`
pub async fn global(State(state): State<AppState>) -> Json<GlobalMetrics> {
    let store = state.store.lock().await;
    Json(metrics::global(&**store))
}

/// `GET /api/proyecto/metricas/:id`
pub async fn single(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectMetrics>> {
    let store = state.store.lock().await;
    Ok(Json(metrics::single(&**store, &id)?))
}

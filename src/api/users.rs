//! Tracker users, keyed by email.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::info;

use super::error::{ApiResult, json_body};
use super::server::AppState;
use crate::Error;
use crate::models::User;
use crate::storage::{self, USERS};
use crate::validation::{NewUser, Validate};

/// `POST /users` - 409 if the email is already registered
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let draft = json_body(body)?;
    draft.validate().map_err(Error::Validation)?;

    let email = draft.email.unwrap_or_default();
    let user = User::new(email.clone());
    let mut store = state.store.lock().await;
    store.create(USERS, &email, storage::to_document(&user)?)?;
    info!(user = %email, "Created user");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": email, "path": format!("{}/{}", USERS, email) })),
    ))
}

/// `GET /users/:email`
pub async fn get(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    let doc = store
        .get(USERS, &email)?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
    Ok(Json(storage::with_id(&email, doc)))
}

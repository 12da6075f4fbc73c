//! Account registration and login.
//!
//! Both endpoints answer every failure with 400 `{message}`; login never
//! says whether the email or the password was wrong.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::error::{ApiError, ApiResult, json_body};
use super::server::AppState;
use crate::models::Profile;
use crate::storage::{self, PROFILES};
use crate::validation::{Credentials, Registration, Validate};
use crate::Error;

const LOGIN_FAILED: &str = "Error en el inicio de sesión";

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Registration>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let registration = json_body(body)?;
    registration
        .validate()
        .map_err(|e| ApiError::message(StatusCode::BAD_REQUEST, e))?;

    let mut store = state.store.lock().await;
    match create_account(&state, &mut **store, registration) {
        Ok(uid) => {
            info!(uid = %uid, "Registered user");
            Ok((
                StatusCode::CREATED,
                Json(json!({ "message": "Usuario registrado exitosamente" })),
            ))
        }
        Err(e) => {
            warn!(error = %e, "Registration failed");
            Err(ApiError::message(StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

/// Provision the identity, then its profile document. Returns the uid.
fn create_account(
    state: &AppState,
    store: &mut dyn storage::DocumentStore,
    registration: Registration,
) -> crate::Result<String> {
    let email = registration.email.unwrap_or_default();
    let password = registration.password.unwrap_or_default();
    let record = state.identity.create_user(
        store,
        &email,
        &password,
        registration.username.as_deref(),
    )?;

    let profile = Profile {
        username: registration.username.unwrap_or_default(),
        email: record.email.clone(),
        created_at: Utc::now(),
    };
    store.set(PROFILES, &record.uid, storage::to_document(&profile)?)?;
    Ok(record.uid)
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let credentials = json_body(body)
        .map_err(|_| ApiError::message(StatusCode::BAD_REQUEST, LOGIN_FAILED))?;

    let store = state.store.lock().await;
    let token = match (credentials.email, credentials.password) {
        (Some(email), Some(password)) => state
            .identity
            .authenticate(&**store, &email, &password)
            .and_then(|record| state.identity.issue_token(&record)),
        _ => Err(Error::Unauthorized("Missing credentials".to_string())),
    };

    match token {
        Ok(token) => Ok(Json(json!({ "token": token }))),
        Err(e) => {
            warn!(error = %e, "Login failed");
            Err(ApiError::message(StatusCode::BAD_REQUEST, LOGIN_FAILED))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::identity::TokenIssuer;
    use crate::storage::{PROFILES, generate_id};
    use crate::test_utils::{TEST_SECRET, login_token, memory_state, send};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_register_then_login() {
        let state = memory_state();
        let app = router(state.clone());
        let token = login_token(&app, "ana@example.com").await;

        let issuer = TokenIssuer::new(TEST_SECRET.as_bytes(), 60);
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.email, "ana@example.com");

        let store = state.store.lock().await;
        let profiles = store.list(PROFILES).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].0, claims.sub);
        assert_eq!(profiles[0].1["email"], json!("ana@example.com"));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let app = router(memory_state());
        let body = json!({
            "email": "ana@example.com",
            "password": "secret-pass",
            "username": "ana"
        });
        let (status, _) = send(&app, Method::POST, "/api/register", Some(body.clone()), None).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, resp) = send(&app, Method::POST, "/api/register", Some(body), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            resp["message"],
            json!("The email address is already in use by another account.")
        );
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = router(memory_state());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({"email": "ana@example.com", "password": "123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("password"));

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/register",
            Some(json!({"email": "not-an-email", "password": "secret-pass"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_failures_look_alike() {
        let app = router(memory_state());
        login_token(&app, "ana@example.com").await;

        for body in [
            json!({"email": "ana@example.com", "password": "wrong-pass"}),
            json!({"email": "nobody@example.com", "password": "secret-pass"}),
            json!({"email": "ana@example.com"}),
        ] {
            let (status, resp) = send(&app, Method::POST, "/api/login", Some(body), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp, json!({"message": "Error en el inicio de sesión"}));
        }
    }

    #[tokio::test]
    async fn test_token_from_other_secret_is_rejected() {
        let app = router(memory_state());
        let token = TokenIssuer::new(generate_id().as_bytes(), 60)
            .issue("uid", "ana@example.com")
            .unwrap();
        let (status, _) = send(&app, Method::GET, "/tasks", None, Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::error;

use crate::Error;

/// Body of every unexpected server failure.
pub const SERVER_ERROR: &str = "Error en el servidor";

/// An error response: a status code and its JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiError {
    /// A `{message}` body.
    pub fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    /// An `{error}` body.
    pub fn error(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": error.into() }),
        }
    }

    /// 500 with the failure detail echoed back.
    pub fn internal(details: impl std::fmt::Display) -> Self {
        let details = details.to_string();
        error!(details = %details, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "error": SERVER_ERROR, "details": details }),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(message) => ApiError::message(StatusCode::NOT_FOUND, message),
            Error::Validation(message) => ApiError::message(StatusCode::BAD_REQUEST, message),
            Error::Unauthorized(message) => ApiError::error(StatusCode::UNAUTHORIZED, message),
            Error::Conflict(_) => ApiError::error(StatusCode::CONFLICT, "ALREADY_EXISTS"),
            other => ApiError::internal(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::message(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Unwrap a JSON body extracted as `Result<Json<T>, JsonRejection>`.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value).map_err(ApiError::from)
}

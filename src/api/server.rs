//! HTTP server: shared state, routing and startup.

use axum::{
    Json, Router,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::error::{ApiError, SERVER_ERROR};
use super::{auth, metrics, projects, tasks, tree, users};
use crate::identity::IdentityProvider;
use crate::storage::DocumentStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Document store (wrapped in Mutex for thread safety)
    pub store: Arc<Mutex<Box<dyn DocumentStore>>>,
    /// Account management and token checks
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(store: Box<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            identity,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/tasks/:task_id",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/health", get(health))
        // Projects
        .route("/api/proyectos", get(projects::list).post(projects::create))
        .route(
            "/api/proyectos/:id",
            get(projects::get).put(projects::update).delete(projects::delete),
        )
        .route("/api/proyectos/:id/prueba", get(projects::milestone_overview))
        .route(
            "/api/proyectos/:id/recurso",
            get(projects::list_resources).post(projects::add_resource),
        )
        .route("/api/recursos", get(projects::list))
        // Milestone tree
        .route("/api/proyectos/:id/hito", post(tree::add_milestone))
        .route(
            "/api/proyectos/:id/hito/:milestone",
            put(tree::replace_milestone).delete(tree::delete_milestone),
        )
        .route(
            "/api/proyectos/:id/hito/:milestone/prueba",
            post(tree::add_test),
        )
        .route(
            "/api/proyectos/:id/hito/:milestone/prueba/:test",
            put(tree::replace_test).delete(tree::delete_test),
        )
        .route(
            "/api/proyectos/:id/hito/:milestone/prueba/:test/defecto",
            get(tree::list_defects).post(tree::add_defect),
        )
        .route(
            "/api/proyectos/:id/hito/:milestone/prueba/:test/defecto/:defect",
            axum::routing::delete(tree::delete_defect),
        )
        // Metrics
        .route("/api/proyecto/metricas", get(metrics::per_project))
        .route("/api/proyecto/metricas/all", get(metrics::global))
        .route("/api/proyecto/metricas/:id", get(metrics::single))
        // Accounts
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        // Task tracker
        .route("/users", post(users::create))
        .route("/users/:email", get(users::get))
        .merge(guarded)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
pub async fn start_server(state: AppState, addr: &str) -> crate::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "Starting qatrack API at http://{}", local);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Reject requests without a valid `Authorization: Bearer` token.
///
/// Verified claims are stored in the request extensions.
async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::error(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;

    let claims = state.identity.verify_token(token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::message(StatusCode::NOT_FOUND, "Ruta no encontrada")
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(details = %details, "Handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": SERVER_ERROR, "details": details })),
    )
        .into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

// HTTP endpoints for the session check

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::auth::SessionValidator;
use crate::store::RequestScope;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// State shared by all handlers.
pub struct AppState {
    validator: Arc<SessionValidator>,
    /// Cancelled on server shutdown; every request lookup derives from it.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(validator: Arc<SessionValidator>, shutdown: CancellationToken) -> Self {
        Self {
            validator,
            shutdown,
        }
    }
}

pub type SharedState = Arc<AppState>;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/auth", any(auth_resource))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Kind of request made against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Get,
    Post,
    Put,
    Delete,
    Other,
}

impl From<&Method> for RequestKind {
    fn from(method: &Method) -> Self {
        match method.as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// `/auth`: only reads are supported.
async fn auth_resource(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    match RequestKind::from(&method) {
        RequestKind::Get => check_session(&state, &headers).await,
        RequestKind::Post | RequestKind::Put | RequestKind::Delete | RequestKind::Other => {
            method_not_allowed()
        }
    }
}

async fn check_session(state: &AppState, headers: &HeaderMap) -> Response {
    // Dropping this handler (client went away) cancels the store lookup.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let verdict = state.validator.validate(headers, cancel).await;
    debug!(status = verdict.status().as_u16(), reason = verdict.reason(), "Auth check complete");

    empty_json(verdict.status())
}

/// Response with the given status and an empty (`null`) JSON body.
fn empty_json(status: StatusCode) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
        Json(Value::Null),
    )
        .into_response()
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, HeaderValue::from_static("GET"))],
    )
        .into_response()
}

/// Liveness plus store reachability; never looks at cookies.
async fn health_check(State(state): State<SharedState>) -> (StatusCode, Json<Value>) {
    let store = state.validator.store();
    let scope = RequestScope::new(
        state.validator.config().timeout,
        state.shutdown.child_token(),
    );

    let (status, health, store_status) = match scope.run(store.ping()).await {
        Ok(()) => (StatusCode::OK, "healthy", "up"),
        Err(e) => {
            tracing::warn!(store = store.name(), error = %e, "Session store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "down")
        }
    };

    (
        status,
        Json(serde_json::json!({
            "status": health,
            "store": store_status,
            "backend": store.name(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

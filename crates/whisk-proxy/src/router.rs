//! Control router - maps the init/run protocol onto HTTP
//!
//! - `POST /init` → 200 `OK`, or 502 `{"error": ...}`
//! - `POST /run`  → 200 with the action's JSON result, or 502 `{"error": ...}`
//! - anything else → 404 `{"error": "Unknown path: ..."}`
//!
//! Bodies that cannot be read (over the size limit, broken stream) are
//! answered like any other failed activation.

use std::sync::Arc;

use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::runtime::ActionRuntime;

/// Create the control router for `runtime`
pub fn create_router(runtime: Arc<ActionRuntime>, config: &ProxyConfig) -> Router {
    Router::new()
        .route("/init", post(handle_init).fallback(handle_unknown))
        .route("/run", post(handle_run).fallback(handle_unknown))
        .fallback(handle_unknown)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(runtime)
}

async fn handle_init(
    State(runtime): State<Arc<ActionRuntime>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let result = match body {
        Ok(body) => runtime.init(&body).await,
        Err(rejection) => Err(runtime.reject(rejection.into())),
    };

    match result {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => e.to_response(runtime.stack_traces()),
    }
}

async fn handle_run(
    State(runtime): State<Arc<ActionRuntime>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let result = match body {
        Ok(body) => runtime.run(&body).await,
        Err(rejection) => Err(runtime.reject(rejection.into())),
    };

    match result {
        Ok(result) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            result.to_string(),
        )
            .into_response(),
        Err(e) => e.to_response(runtime.stack_traces()),
    }
}

async fn handle_unknown(uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "Request for unknown path");
    ProxyError::UnknownPath(uri.path().to_string()).into_response()
}

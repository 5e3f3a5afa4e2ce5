//! HTTP/REST server for registered pipelines
//!
//! Per registered pipeline prefix `/p`:
//! - POST /p/invoke - single invocation
//! - POST /p/batch - index-aligned batch invocation
//! - POST /p/stream - streaming invocation via SSE
//! - GET /p/input_schema | /p/output_schema | /p/config_schema - introspection
//!
//! Plus `GET /` as the liveness route. Every failure is funneled through
//! `ApiError` before a response leaves the server: unknown prefixes are 404
//! with a `not_found` body, rejected payloads are 422 with the offending
//! field paths, and pipeline failures are 500 without leaking internals.

use crate::error::{ApiError, Error, Result};
use crate::sse;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pipehost_core::{
    DispatchOptions, Dispatcher, ErrorPayload, InvocationRequest, RegisteredPipeline,
    RouteRegistry, RunConfig, Schema,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Shared server state: the write-once registry and the dispatcher
#[derive(Clone)]
pub struct AppState {
    /// Pipeline table, immutable after startup
    registry: Arc<RouteRegistry>,
    /// Invocation dispatcher
    dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Create server state from a built registry and dispatcher
    pub fn new(registry: Arc<RouteRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }
}

/// HTTP server exposing registered pipelines
pub struct PipelineServer {
    /// Server bind address
    bind_address: String,
    /// Shared server state
    state: AppState,
}

impl PipelineServer {
    /// Create a new server
    ///
    /// # Arguments
    ///
    /// * `bind_address` - Address to bind to (e.g., "127.0.0.1:8000")
    /// * `registry` - Registry built at startup; immutable from here on
    /// * `options` - Dispatcher tunables (timeouts, concurrency, buffering)
    pub fn new(
        bind_address: impl Into<String>,
        registry: RouteRegistry,
        options: DispatchOptions,
    ) -> Self {
        let state = AppState::new(
            Arc::new(registry),
            Arc::new(Dispatcher::new(options)),
        );
        Self {
            bind_address: bind_address.into(),
            state,
        }
    }

    /// Build the router with all endpoints
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind and serve until a shutdown signal arrives
    ///
    /// This method blocks until SIGTERM/SIGINT, then drains gracefully.
    pub async fn serve(self) -> Result<()> {
        let addr: std::net::SocketAddr = self
            .bind_address
            .parse()
            .map_err(|e| Error::Server(format!("invalid bind address: {}", e)))?;

        let router = build_router(self.state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Server(format!("failed to bind: {}", e)))?;

        tracing::info!("listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Server(format!("server error: {}", e)))?;

        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Build the router with all endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route(
            "/:pipeline/invoke",
            post(invoke_handler).fallback(method_fallback),
        )
        .route(
            "/:pipeline/batch",
            post(batch_handler).fallback(method_fallback),
        )
        .route(
            "/:pipeline/stream",
            post(stream_handler).fallback(method_fallback),
        )
        .route(
            "/:pipeline/input_schema",
            get(input_schema_handler).fallback(method_fallback),
        )
        .route(
            "/:pipeline/output_schema",
            get(output_schema_handler).fallback(method_fallback),
        )
        .route(
            "/:pipeline/config_schema",
            get(config_schema_handler).fallback(method_fallback),
        )
        .fallback(not_found_handler)
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::cors::CorsLayer::permissive()),
        )
}

// Request/response bodies

/// Request body for /invoke and /stream
#[derive(Debug, Deserialize)]
struct InvokeRequest {
    input: Value,
    #[serde(default)]
    config: Option<RunConfig>,
    #[serde(default)]
    kwargs: Option<Map<String, Value>>,
}

/// Response body for /invoke
#[derive(Debug, Serialize)]
struct InvokeResponse {
    output: Value,
}

/// Request body for /batch
#[derive(Debug, Deserialize)]
struct BatchRequest {
    inputs: Vec<Value>,
    #[serde(default)]
    config: Option<RunConfig>,
}

/// Response body for /batch, index-aligned with the request's inputs
#[derive(Debug, Serialize)]
struct BatchResponse {
    outputs: Vec<BatchSlot>,
}

/// One batch slot: the output value, or an error object in its place
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchSlot {
    Output(Value),
    Error { error: ErrorPayload },
}

// Handler implementations

/// GET / - liveness
async fn root_handler() -> Json<Value> {
    Json(serde_json::json!({"status": "pipehost running"}))
}

/// Look up a registered pipeline or fail with a not_found body
fn lookup<'a>(
    state: &'a AppState,
    prefix: &str,
) -> std::result::Result<&'a RegisteredPipeline, ApiError> {
    state
        .registry
        .get(prefix)
        .ok_or_else(|| ApiError(pipehost_core::Error::NotFound(prefix.to_string())))
}

/// POST /:pipeline/invoke - single invocation
async fn invoke_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
    Json(request): Json<InvokeRequest>,
) -> std::result::Result<Json<InvokeResponse>, ApiError> {
    let entry = lookup(&state, &prefix)?;
    entry.validate_input(&request.input)?;

    let invocation = InvocationRequest::new(request.input)
        .with_config(request.config.unwrap_or_default())
        .with_kwargs(request.kwargs.unwrap_or_default());

    let output = state.dispatcher.invoke(entry.pipeline(), invocation).await?;

    Ok(Json(InvokeResponse { output }))
}

/// POST /:pipeline/batch - index-aligned batch invocation
///
/// Any element failing validation rejects the whole call before a single
/// pipeline call happens; execution failures are reported per element.
async fn batch_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
    Json(request): Json<BatchRequest>,
) -> std::result::Result<Json<BatchResponse>, ApiError> {
    let entry = lookup(&state, &prefix)?;
    entry.validate_inputs(&request.inputs)?;

    let results = state
        .dispatcher
        .batch(
            entry.pipeline(),
            request.inputs,
            request.config.unwrap_or_default(),
        )
        .await;

    let outputs = results
        .into_iter()
        .map(|result| match result {
            Ok(output) => BatchSlot::Output(output),
            Err(error) => BatchSlot::Error {
                error: ErrorPayload::from(&error),
            },
        })
        .collect();

    Ok(Json(BatchResponse { outputs }))
}

/// POST /:pipeline/stream - streaming invocation via SSE
async fn stream_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
    Json(request): Json<InvokeRequest>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let entry = lookup(&state, &prefix)?;
    entry.validate_input(&request.input)?;

    let invocation = InvocationRequest::new(request.input)
        .with_config(request.config.unwrap_or_default())
        .with_kwargs(request.kwargs.unwrap_or_default());

    let events = state
        .dispatcher
        .stream(Arc::clone(entry.pipeline()), invocation);

    Ok(sse::encode(events))
}

/// GET /:pipeline/input_schema
async fn input_schema_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> std::result::Result<Json<Schema>, ApiError> {
    let entry = lookup(&state, &prefix)?;
    Ok(Json(entry.descriptor().input_schema.clone()))
}

/// GET /:pipeline/output_schema
async fn output_schema_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> std::result::Result<Json<Schema>, ApiError> {
    let entry = lookup(&state, &prefix)?;
    Ok(Json(entry.descriptor().output_schema.clone()))
}

/// GET /:pipeline/config_schema
async fn config_schema_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> std::result::Result<Json<Schema>, ApiError> {
    let entry = lookup(&state, &prefix)?;
    Ok(Json(entry.descriptor().config_schema.clone()))
}

/// Wrong method on a pipeline route: unknown prefixes are still 404 so the
/// route table never reveals more than the registry does; known prefixes get
/// the plain 405.
async fn method_fallback(State(state): State<AppState>, uri: Uri) -> Response {
    let prefix = uri
        .path()
        .trim_matches('/')
        .split('/')
        .next()
        .unwrap_or("")
        .to_string();

    if state.registry.get(&prefix).is_none() {
        return ApiError(pipehost_core::Error::NotFound(prefix)).into_response();
    }
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

/// Unmatched path: structured not_found body
async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError(pipehost_core::Error::NotFound(uri.path().to_string()))
}

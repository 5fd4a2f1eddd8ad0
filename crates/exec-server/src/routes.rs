use std::sync::Arc;
use std::time::{Instant, SystemTime};

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use protocol::{ExecuteRequest, ExecutionResult, HealthStatus};
use script_runner::ScriptRunner;
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;

#[derive(Clone)]
pub(crate) struct AppState {
    runner: Arc<ScriptRunner>,
}

pub(crate) fn router(runner: Arc<ScriptRunner>, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/execute", post(execute))
        .with_state(AppState { runner })
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(middleware::from_fn(log_http_request))
}

/// Input problems caught before any process is started.
#[derive(Debug, Error)]
pub(crate) enum RequestError {
    #[error("Invalid request body: {message}")]
    Body { status: StatusCode, message: String },
    #[error("Request body must be a JSON object")]
    NotAnObject,
    #[error("Script is required")]
    MissingScript,
    #[error("Script must be a string")]
    ScriptNotText,
    #[error("Script must not be empty")]
    EmptyScript,
}

impl From<JsonRejection> for RequestError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Body { status, .. } if status.is_client_error() => *status,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(ExecutionResult::rejected(self.to_string()))).into_response()
    }
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::ok_at(SystemTime::now()))
}

async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ExecutionResult>, RequestError> {
    let request = payload
        .map_err(RequestError::from)
        .and_then(|Json(body)| parse_request(body))
        .inspect_err(|err| {
            tracing::warn!(event = "execution.rejected", error = %err, "execute request rejected");
        })?;

    let note_id = request.note_id.as_deref().unwrap_or("-");
    tracing::info!(
        event = "execution.start",
        note_id = %note_id,
        script_chars = request.script.chars().count(),
        "execution started"
    );
    let span = tracing::info_span!("execution", note_id = %note_id);
    let result = state.runner.run(&request.script).instrument(span).await;
    tracing::info!(
        event = "execution.finish",
        note_id = %note_id,
        success = result.success,
        execution_time_ms = result.execution_time_ms,
        "execution finished"
    );
    Ok(Json(result))
}

/// Validates the raw body. The correlation id is taken as-is and stringified
/// when it is not already text.
fn parse_request(body: Value) -> Result<ExecuteRequest, RequestError> {
    let Value::Object(fields) = body else {
        return Err(RequestError::NotAnObject);
    };
    let script = match fields.get("script") {
        None | Some(Value::Null) => return Err(RequestError::MissingScript),
        Some(Value::String(script)) => script,
        Some(_) => return Err(RequestError::ScriptNotText),
    };
    if script.is_empty() {
        return Err(RequestError::EmptyScript);
    }
    let note_id = fields
        .get("noteId")
        .or_else(|| fields.get("correlationId"))
        .filter(|value| !value.is_null())
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });
    Ok(ExecuteRequest {
        script: script.clone(),
        note_id,
    })
}

async fn log_http_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started_at = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        latency_ms = started_at.elapsed().as_millis() as u64,
        "http request"
    );
    response
}

//! API request handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Form, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::catalog::ScriptTable;
use crate::coordinator::{ExecutionCoordinator, ExecutionRequest};
use crate::errors::KyonrunError;
use crate::sink::{BufferedSink, ExecutionResult, StreamedSink};
use crate::types::{OutputMode, ScriptIdentity};

use super::errors::ApiError;
use super::responses::{HealthResponse, ReloadResponse, ScriptListResponse, SlotListResponse};

/// Chunks buffered between a running script and a slow stream reader.
const STREAM_BUFFER: usize = 64;

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: ExecutionCoordinator,
    pub scripts: Arc<ScriptTable>,
    pub adhoc_enabled: bool,
}

/// Form body of `POST /run`.
#[derive(Debug, Deserialize)]
pub struct RunForm {
    pub code: String,
    #[serde(default)]
    pub mode: Option<OutputMode>,
}

/// Query string of `GET /scripts/{id}`.
#[derive(Debug, Deserialize)]
pub struct ModeQuery {
    #[serde(default)]
    pub mode: Option<OutputMode>,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Current registry slots.
pub async fn list_slots(State(state): State<ApiState>) -> Json<SlotListResponse> {
    Json(state.coordinator.registry().snapshot().into())
}

/// Registered script ids.
pub async fn list_scripts(State(state): State<ApiState>) -> Json<ScriptListResponse> {
    let scripts = state.scripts.ids();
    let count = scripts.len();
    Json(ScriptListResponse {
        scripts,
        count,
        adhoc: state.adhoc_enabled,
    })
}

/// Force a reload of the script table.
pub async fn reload_scripts(
    State(state): State<ApiState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let scripts = state.scripts.reload()?;
    Ok(Json(ReloadResponse {
        scripts,
        message: format!("{scripts} scripts registered"),
    }))
}

/// Run caller-supplied source in the ad-hoc slot. Buffered unless asked.
pub async fn run_adhoc(
    State(state): State<ApiState>,
    Form(form): Form<RunForm>,
) -> Result<Response, ApiError> {
    let request =
        ExecutionRequest::adhoc(form.code).with_mode(form.mode.unwrap_or(OutputMode::Buffered));
    execute(&state.coordinator, request).await
}

/// Run a registered script. Streamed unless asked.
pub async fn run_script(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<ModeQuery>,
) -> Result<Response, ApiError> {
    let identity = ScriptIdentity::new(id);
    if identity.is_adhoc() {
        return Err(KyonrunError::ScriptNotFound(identity.to_string()).into());
    }
    let request = ExecutionRequest::registered(identity)
        .with_mode(query.mode.unwrap_or(OutputMode::Streamed));
    execute(&state.coordinator, request).await
}

/// Resolve up front so unknown scripts get a proper status, then run the
/// execution on its own task. A client that goes away never cancels it.
async fn execute(
    coordinator: &ExecutionCoordinator,
    request: ExecutionRequest,
) -> Result<Response, ApiError> {
    let prepared = coordinator.prepare(request)?;

    match prepared.mode() {
        OutputMode::Buffered => {
            let task = tokio::spawn(async move {
                let mut sink = BufferedSink::new();
                prepared.run(&mut sink).await?;
                Ok::<ExecutionResult, KyonrunError>(sink.into_result())
            });
            let result = task
                .await
                .map_err(|e| ApiError::Internal(format!("execution task failed: {e}")))??;
            Ok(Json(result).into_response())
        }
        OutputMode::Streamed => {
            let (sink, rx) = StreamedSink::channel(STREAM_BUFFER);
            let mut sink = sink.with_stall_limit(coordinator.options().limits.kill_grace);
            tokio::spawn(async move {
                let identity = prepared.identity().clone();
                if let Err(e) = prepared.run(&mut sink).await {
                    warn!(%identity, error = %e, "streamed execution aborted");
                }
            });

            let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
            Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
        }
    }
}

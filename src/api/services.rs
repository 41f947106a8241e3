use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use tracing::{Instrument, debug, error, info_span};
use uuid::Uuid;

use super::{
    error::ApiError,
    models::{HealthResponse, JobCounters},
    state::AppState,
    utils::{output_response, read_body},
};
use crate::handlers::JobRequest;

/// Job submission endpoint (POST /uop)
///
/// ## Flow:
/// 1. Read the body (gzip already undone by middleware) under the payload limit
/// 2. Decode the `{cmd, src}` envelope
/// 3. Dispatch to the handler named by the first command segment
/// 4. Return the handler's output verbatim with its content type
///
/// Failures are logged together with the envelope that caused them.
pub async fn submit_job(
    State(state): State<AppState>,
    body: axum::body::Body,
) -> Result<Response, ApiError> {
    let request_id = Uuid::now_v7();
    let span = info_span!("job", %request_id);

    async move {
        let limit = state.config.server.max_payload_bytes.as_usize();
        let body_bytes = read_body(body, limit).await?;
        let request: JobRequest = serde_json::from_slice(&body_bytes)?;

        state.metrics.job_accepted();
        debug!(command = %request.command, url = %request.source.url, "Job accepted");

        let envelope = request.clone();
        match state.registry.dispatch(request).await {
            Ok(output) => {
                state.metrics.job_succeeded();
                output_response(output).await
            }
            Err(err) => {
                state.metrics.job_failed();
                let err = ApiError::from(err);
                error!(
                    command = %envelope.command,
                    url = %envelope.source.url,
                    mimetype = %envelope.source.mime_type,
                    fsize = envelope.source.size_bytes,
                    status = err.status_code().as_u16(),
                    error = %err,
                    "Job failed"
                );
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}

/// Anything other than POST on /uop
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Health check endpoint (GET /health)
///
/// Lists the registered operations and the job counters. The gateway has
/// no background components, so answering at all means healthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();

    let response = HealthResponse {
        status: "healthy".to_string(),
        operations: state.registry.operations(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: JobCounters {
            accepted: snapshot.jobs_accepted,
            succeeded: snapshot.jobs_succeeded,
            failed: snapshot.jobs_failed,
        },
    };

    (StatusCode::OK, Json(response))
}

//! API utility functions
//!
//! Stateless helpers for request and response processing, kept apart from
//! services.rs so they can be unit tested.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::api::error::ApiError;
use crate::handlers::JobOutput;

/// Collects the (already decompressed) body, failing once it grows past
/// `max_size` bytes.
pub async fn read_body(body: Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let collected = Limited::new(body, max_size).collect().await.map_err(|err| {
        if err.downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge(max_size)
        } else {
            ApiError::InvalidPayload(err.to_string())
        }
    })?;

    let data = collected.to_bytes().to_vec();
    validate_body_size(&data, max_size)?;
    Ok(data)
}

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(max_size));
    }
    Ok(())
}

/// Turns a job result into a 200 response carrying the result's content type.
///
/// Staged files are read back and removed before the response is returned.
pub async fn output_response(output: JobOutput) -> Result<Response, ApiError> {
    match output {
        JobOutput::Json(value) => Ok((StatusCode::OK, axum::Json(value)).into_response()),
        JobOutput::Bytes { data, mime_type } => Ok(binary(data, &mime_type)),
        JobOutput::StagedFile { path, mime_type } => {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| ApiError::Internal(format!("read staged result failed, {e}")))?;
            drop(path);
            Ok(binary(data, &mime_type))
        }
    }
}

fn binary(data: Vec<u8>, mime_type: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime_type.to_string())],
        Body::from(data),
    )
        .into_response()
}

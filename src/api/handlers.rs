//! Axum request handlers for the HTTP API.
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::api::routes::AppState;
use crate::api::types::{GenerateBody, GenerateResponse};

pub async fn root() -> &'static str {
    "Portrait Pipeline"
}

pub async fn health() -> &'static str {
    "ok"
}

/// `POST /generate`. Every outcome, including failures, is a 200 with a JSON envelope.
pub async fn generate(State(state): State<Arc<AppState>>, body: Bytes) -> Json<GenerateResponse> {
    let parsed: GenerateBody = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(error = %err, "rejecting malformed request body");
            return Json(GenerateResponse::failed(format!("Invalid request body: {err}")));
        }
    };
    let request = match parsed.into_request() {
        Ok(request) => request,
        Err(err) => return Json(err.into()),
    };

    match state.service.handle(request).await {
        // Background handles are dropped: the tasks keep running detached.
        Ok(completion) => Json(completion.outcome.into()),
        Err(err) => {
            tracing::error!(error = %err, "generation request failed");
            Json(err.into())
        }
    }
}

/// `GET /storage/:bucket/*path`. Serves the process-local bucket; 404 otherwise.
pub async fn stored_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
) -> Response {
    let Some(local) = state.local_objects.as_ref().filter(|l| l.bucket == bucket) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match local.storage.object(path.trim_start_matches('/')).await {
        Some(asset) => ([(header::CONTENT_TYPE, asset.content_type)], asset.bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

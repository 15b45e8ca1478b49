use super::state::AppState;
use crate::capture::{CaptureStatus, SpeechCaptureController, TracingListener};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartCaptureRequest {
    /// Optional capture ID (if not provided, generate UUID)
    pub capture_id: Option<String>,

    /// Override the engine's continuous mode
    pub continuous: Option<bool>,

    /// Override the recognition language
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub capture_id: String,
    pub status: CaptureStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub capture_id: String,
    pub transcript: String,
    pub interim: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

fn error_response(status: StatusCode, error: String, code: Option<String>) -> Response {
    (status, Json(ErrorResponse { error, code })).into_response()
}

fn not_found(capture_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Capture {} not found", capture_id),
        None,
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /captures
/// Start a new speech capture
pub async fn start_capture(
    State(state): State<AppState>,
    Json(req): Json<StartCaptureRequest>,
) -> impl IntoResponse {
    let capture_id = req
        .capture_id
        .unwrap_or_else(|| format!("capture-{}", uuid::Uuid::new_v4()));

    info!("Starting capture: {}", capture_id);

    if !state.factory.is_supported() {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Speech recognition is not available".to_string(),
            Some("unsupported".to_string()),
        );
    }

    // Held across start so concurrent requests for one id cannot both start
    let mut captures = state.captures.write().await;
    if let Some(existing) = captures.get(&capture_id) {
        if existing.state().is_running() {
            return error_response(
                StatusCode::CONFLICT,
                format!("Capture {} is already running", capture_id),
                None,
            );
        }
    }

    let mut config = state.defaults.clone();
    if let Some(continuous) = req.continuous {
        config.continuous = continuous;
    }
    if let Some(language) = req.language {
        config.language = language;
    }

    let controller = Arc::new(SpeechCaptureController::new(
        capture_id.clone(),
        config,
        Arc::clone(&state.factory),
        Arc::new(TracingListener::new(capture_id.clone())),
    ));

    if !controller.start().await {
        let status = controller.status();
        error!("Failed to start capture {}: {:?}", capture_id, status.last_error);
        return error_response(
            StatusCode::BAD_GATEWAY,
            format!("Failed to start capture {}", capture_id),
            status.last_error,
        );
    }

    // A finished capture with the same id is replaced
    captures.insert(capture_id.clone(), Arc::clone(&controller));
    drop(captures);

    info!("Capture started successfully: {}", capture_id);

    (
        StatusCode::OK,
        Json(StartCaptureResponse {
            capture_id: capture_id.clone(),
            status: controller.status(),
            message: format!("Capture {} started", capture_id),
        }),
    )
        .into_response()
}

/// POST /captures/:capture_id/stop
/// Stop a capture; the transcript is final once the state reads `stopped`
pub async fn stop_capture(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let controller = {
        let captures = state.captures.read().await;
        captures.get(&capture_id).cloned()
    };

    match controller {
        Some(controller) => {
            info!("Stopping capture: {}", capture_id);
            controller.stop().await;
            (StatusCode::OK, Json(controller.status())).into_response()
        }
        None => not_found(&capture_id),
    }
}

/// DELETE /captures/:capture_id
/// Forget a finished capture
pub async fn delete_capture(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let mut captures = state.captures.write().await;

    match captures.get(&capture_id) {
        Some(controller) if controller.state().is_running() => error_response(
            StatusCode::CONFLICT,
            format!("Capture {} is still running", capture_id),
            None,
        ),
        Some(_) => {
            captures.remove(&capture_id);
            info!("Removed capture: {}", capture_id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => not_found(&capture_id),
    }
}

/// GET /captures/:capture_id/status
pub async fn get_capture_status(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let captures = state.captures.read().await;

    match captures.get(&capture_id) {
        Some(controller) => (StatusCode::OK, Json(controller.status())).into_response(),
        None => not_found(&capture_id),
    }
}

/// GET /captures/:capture_id/transcript
/// Accumulated transcript plus the current interim hypothesis
pub async fn get_capture_transcript(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let captures = state.captures.read().await;

    match captures.get(&capture_id) {
        Some(controller) => {
            let status = controller.status();
            (
                StatusCode::OK,
                Json(TranscriptResponse {
                    capture_id,
                    transcript: status.transcript,
                    interim: status.interim,
                }),
            )
                .into_response()
        }
        None => not_found(&capture_id),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

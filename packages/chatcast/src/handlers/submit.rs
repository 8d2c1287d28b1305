use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use tracing::debug;

use crate::AppState;
use crate::ws::{SubmitPayload, SubmitResponse};

/// Request/response fallback for clients without a realtime connection.
/// Echoes `text` back and does not reach the registry or the broadcaster.
///
/// The body is parsed as JSON whatever its Content-Type.
pub async fn submit_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, (StatusCode, String)> {
    let payload: SubmitPayload = serde_json::from_slice(&body).map_err(|e| {
        debug!("Rejected submission: {}", e);
        (StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))
    })?;

    state.metrics.submission();
    debug!(has_text = payload.text.is_some(), "Submission received");
    Ok(Json(SubmitResponse {
        received: payload.text,
    }))
}

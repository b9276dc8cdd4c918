use axum::{extract::State, Json};
use tracing::debug;

use crate::api_types::VersionResponse;
use crate::state::AppState;

/// Liveness banner the imitated server prints at its root.
pub async fn root() -> &'static str {
    "Ollama is running"
}

pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    debug!("handling GET /api/version");
    Json(VersionResponse {
        version: state.version.as_ref().clone(),
    })
}

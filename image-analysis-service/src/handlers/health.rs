use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe. Reports whether a credential is configured but never
/// calls the model.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "image-analysis-service",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model.as_str(),
        "credential_configured": state.clients.has_credential()
    }))
}

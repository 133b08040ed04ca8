use crate::services::get_metrics;
use axum::{http::StatusCode, response::IntoResponse};

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        get_metrics(),
    )
}

//! HTTP handlers for the billing dashboard API.

pub mod bills;
pub mod notifications;
pub mod settings;
pub mod system;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::get_metrics;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "billdesk",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn readiness_check() -> impl IntoResponse {
    Json(json!({
        "status": "ready",
        "service": "billdesk"
    }))
}

/// Metrics endpoint for Prometheus scraping.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

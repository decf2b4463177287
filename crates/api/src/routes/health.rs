//! Aggregate readiness endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// GET /manage/health. Healthy only when every collaborator and the backlog
/// answer.
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut errors: Vec<String> = match state.coordinator.health_check().await {
        Ok(()) => Vec::new(),
        Err(failures) => failures.iter().map(ToString::to_string).collect(),
    };
    if let Err(e) = state.backlog.health_check().await {
        errors.push(format!("backlog: {e}"));
    }

    if errors.is_empty() {
        return (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                errors,
            }),
        );
    }

    tracing::warn!(?errors, "health check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "unavailable",
            errors,
        }),
    )
}

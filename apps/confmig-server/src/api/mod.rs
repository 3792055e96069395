use axum::response::IntoResponse;
use axum::Json;

pub mod cli;
pub mod events;
pub mod metrics;
pub mod migrate;
pub mod preview;
pub mod projects;

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Meta",
    responses((status = 200, description = "Service healthy"))
)]
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"ok": true}))
}

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::app_state::AppState;
use crate::responses;

/// List the projects visible to the configured credentials.
#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    responses(
        (status = 200, description = "Projects the token can see"),
        (status = 401, description = "Backend rejected the token"),
        (status = 502, description = "Backend unreachable")
    )
)]
pub async fn list_projects(State(state): State<AppState>) -> axum::response::Response {
    match state.directory().list_projects().await {
        Ok(projects) => Json(projects).into_response(),
        Err(err) => responses::read_error(&err),
    }
}

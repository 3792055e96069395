use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::cli::CliError;
use crate::responses;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CliRequest {
    /// Subcommand and arguments, e.g. `"db push"`.
    pub command: String,
    /// Connection string passed through as `--db-url`.
    pub db_string: String,
}

/// Run a `supabase` CLI subcommand against a database.
#[utoipa::path(
    post,
    path = "/cli",
    tag = "Cli",
    request_body = CliRequest,
    responses(
        (status = 200, description = "Captured stdout of the command"),
        (status = 502, description = "Command failed, timed out or could not be spawned")
    )
)]
pub async fn run_command(
    State(state): State<AppState>,
    Json(req): Json<CliRequest>,
) -> axum::response::Response {
    match state.cli().execute(&req.command, &req.db_string).await {
        Ok(output) => Json(serde_json::json!({"output": output})).into_response(),
        Err(err) => {
            warn!(command = %req.command, %err, "cli command failed");
            let title = match &err {
                CliError::Spawn(_) => "CLI Unavailable",
                CliError::Timeout(_) => "CLI Timeout",
                CliError::NonZero { .. } => "CLI Command Failed",
            };
            responses::problem(StatusCode::BAD_GATEWAY, title, err.to_string())
        }
    }
}

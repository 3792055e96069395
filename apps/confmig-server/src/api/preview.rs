use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use metrics::counter;
use serde::Deserialize;
use utoipa::ToSchema;

use confmig_core::diff;
use confmig_core::run::RunKind;
use confmig_core::selection::CategorySelection;
use confmig_events::topics;

use crate::app_state::AppState;
use crate::responses;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub source_id: String,
    pub dest_id: String,
    /// Positional category flags in registry order; short vectors are
    /// padded with `false`.
    pub config_items: Vec<bool>,
}

/// Compute the per-category diff between two projects.
#[utoipa::path(
    post,
    path = "/preview",
    tag = "Runs",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "One config block per enabled category"),
        (status = 400, description = "Selection vector longer than the category registry"),
        (status = 409, description = "A run for this project pair is already active")
    )
)]
pub async fn generate_preview(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> axum::response::Response {
    let selection = match CategorySelection::from_flags(&req.config_items) {
        Ok(selection) => selection,
        Err(err) => {
            return responses::problem(StatusCode::BAD_REQUEST, "Bad Request", err.to_string())
        }
    };
    let guard = match state
        .runs()
        .begin(&req.source_id, &req.dest_id, RunKind::Preview)
    {
        Ok(guard) => guard,
        Err(err) => {
            state.bus().publish(
                topics::TOPIC_RUN_REJECTED,
                &serde_json::json!({
                    "kind": RunKind::Preview.as_str(),
                    "source_id": req.source_id,
                    "dest_id": req.dest_id,
                }),
            );
            return responses::run_already_active(err.to_string());
        }
    };
    counter!("confmig_previews_total").increment(1);
    state.bus().publish(
        topics::TOPIC_RUN_STARTED,
        &serde_json::json!({
            "kind": guard.kind().as_str(),
            "source_id": req.source_id,
            "dest_id": req.dest_id,
        }),
    );

    let configs =
        diff::generate_preview(state.store(), &req.source_id, &req.dest_id, &selection).await;

    state.bus().publish(
        topics::TOPIC_RUN_COMPLETED,
        &serde_json::json!({
            "kind": guard.kind().as_str(),
            "source_id": req.source_id,
            "dest_id": req.dest_id,
            "categories": configs.len(),
        }),
    );
    drop(guard);
    Json(configs).into_response()
}

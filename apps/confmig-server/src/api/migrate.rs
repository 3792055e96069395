use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use metrics::counter;
use serde::Deserialize;
use utoipa::ToSchema;

use confmig_core::executor;
use confmig_core::run::RunKind;
use confmig_events::topics;
use confmig_protocol::{EntryOutcome, ProjectConfig};

use crate::app_state::AppState;
use crate::responses;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MigrateRequest {
    pub source_id: String,
    pub dest_id: String,
    /// Config blocks from a prior preview, possibly edited by the
    /// operator before submission.
    pub project_config: Vec<ProjectConfig>,
}

/// Apply a previewed diff set to the destination project.
#[utoipa::path(
    post,
    path = "/migrate",
    tag = "Runs",
    request_body = MigrateRequest,
    responses(
        (status = 200, description = "Same config blocks, each entry annotated with an outcome"),
        (status = 409, description = "A run for this project pair is already active")
    )
)]
pub async fn apply_migration(
    State(state): State<AppState>,
    Json(req): Json<MigrateRequest>,
) -> axum::response::Response {
    let guard = match state
        .runs()
        .begin(&req.source_id, &req.dest_id, RunKind::Migrate)
    {
        Ok(guard) => guard,
        Err(err) => {
            state.bus().publish(
                topics::TOPIC_RUN_REJECTED,
                &serde_json::json!({
                    "kind": RunKind::Migrate.as_str(),
                    "source_id": req.source_id,
                    "dest_id": req.dest_id,
                }),
            );
            return responses::run_already_active(err.to_string());
        }
    };
    counter!("confmig_migrations_total").increment(1);
    state.bus().publish(
        topics::TOPIC_RUN_STARTED,
        &serde_json::json!({
            "kind": guard.kind().as_str(),
            "source_id": req.source_id,
            "dest_id": req.dest_id,
        }),
    );

    let configs = executor::migrate(
        state.store(),
        req.project_config,
        &req.source_id,
        &req.dest_id,
    )
    .await;

    for config in &configs {
        let applied = count_outcomes(config, |o| matches!(o, EntryOutcome::Applied));
        let skipped = count_outcomes(config, |o| matches!(o, EntryOutcome::Skipped { .. }));
        let failed = count_outcomes(config, |o| matches!(o, EntryOutcome::Failed { .. }));
        counter!("confmig_entries_applied_total").increment(applied as u64);
        counter!("confmig_entries_skipped_total").increment(skipped as u64);
        counter!("confmig_entries_failed_total").increment(failed as u64);
        state.bus().publish(
            topics::TOPIC_MIGRATE_CATEGORY_DONE,
            &serde_json::json!({
                "category": config.name,
                "dest_id": req.dest_id,
                "applied": applied,
                "skipped": skipped,
                "failed": failed,
            }),
        );
    }
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

fn count_outcomes(config: &ProjectConfig, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
    config
        .diffs
        .iter()
        .filter_map(|entry| entry.outcome.as_ref())
        .filter(|outcome| pred(outcome))
        .count()
}

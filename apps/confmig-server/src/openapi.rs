use axum::response::IntoResponse;
use axum::Json;
use utoipa::OpenApi;

use confmig_protocol::{
    Category, DiffEntry, EntryOutcome, MetricSample, ProblemDetails, Project, ProjectConfig,
    SkipReason,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "confmig-server",
        description = "Configuration diff, migration and live metrics service"
    ),
    paths(
        crate::api::events::events_sse,
        crate::api::healthz,
        crate::api::projects::list_projects,
        crate::api::preview::generate_preview,
        crate::api::migrate::apply_migration,
        crate::api::cli::run_command,
        crate::api::metrics::metrics_ws,
    ),
    components(schemas(
        Category,
        DiffEntry,
        EntryOutcome,
        MetricSample,
        ProblemDetails,
        Project,
        ProjectConfig,
        SkipReason,
        crate::api::preview::PreviewRequest,
        crate::api::migrate::MigrateRequest,
        crate::api::cli::CliRequest,
    ))
)]
pub struct ApiDoc;

/// Serve the generated document.
pub async fn openapi_doc() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

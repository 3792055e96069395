use axum::routing::{get, post};
use axum::Router;

use crate::api;
use crate::app_state::AppState;
use crate::openapi;

/// Route paths, kept in one place so handlers, the OpenAPI document and
/// tests agree on the surface.
pub mod paths {
    pub const EVENTS: &str = "/events";
    pub const HEALTHZ: &str = "/healthz";
    pub const PROJECTS: &str = "/projects";
    pub const PREVIEW: &str = "/preview";
    pub const MIGRATE: &str = "/migrate";
    pub const CLI: &str = "/cli";
    pub const WS_METRICS: &str = "/ws/metrics";
    pub const OPENAPI: &str = "/spec/openapi.json";
}

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route(paths::EVENTS, get(api::events::events_sse))
        .route(paths::HEALTHZ, get(api::healthz))
        .route(paths::PROJECTS, get(api::projects::list_projects))
        .route(paths::PREVIEW, post(api::preview::generate_preview))
        .route(paths::MIGRATE, post(api::migrate::apply_migration))
        .route(paths::CLI, post(api::cli::run_command))
        .route(paths::WS_METRICS, get(api::metrics::metrics_ws))
        .route(paths::OPENAPI, get(openapi::openapi_doc))
}

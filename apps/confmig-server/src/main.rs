use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod api;
mod app_state;
mod backend;
mod cli;
pub mod config;
mod metrics_transport;
mod openapi;
mod responses;
mod router;
mod telemetry;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let cfg = config::AppConfig::from_env()?;
    let bind = cfg.bind;
    let cors = cors_layer(&cfg)?;
    let state = AppState::builder(cfg).build();

    let app = router::build_router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "confmig-server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        error!("http server exited with error: {err}");
    }
    Ok(())
}

fn cors_layer(cfg: &config::AppConfig) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = cfg.client_origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::cli::{CliError, CliExecutor};
    use crate::config::AppConfig;
    use crate::router::paths;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use confmig_core::memory::MemoryStore;
    use confmig_core::run::RunKind;
    use confmig_core::store::ReadError;
    use confmig_events::{topics, Bus};
    use confmig_protocol::{Category, ProblemDetails, Project, ProjectConfig, SkipReason};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    struct FakeDirectory {
        projects: Vec<Project>,
        fail: Option<ReadError>,
    }

    #[async_trait]
    impl crate::backend::ProjectDirectory for FakeDirectory {
        async fn list_projects(&self) -> Result<Vec<Project>, ReadError> {
            match &self.fail {
                Some(err) => Err(err.clone()),
                None => Ok(self.projects.clone()),
            }
        }
    }

    struct FakeCli;

    #[async_trait]
    impl CliExecutor for FakeCli {
        async fn execute(&self, command: &str, _conn: &str) -> Result<String, CliError> {
            if command.starts_with("fail") {
                return Err(CliError::NonZero {
                    status: 1,
                    stderr: "boom".into(),
                });
            }
            Ok(format!("ran: {command}"))
        }
    }

    fn build_state(store: Arc<MemoryStore>) -> AppState {
        AppState::builder(AppConfig::default())
            .with_store(store)
            .with_directory(Arc::new(FakeDirectory {
                projects: vec![
                    Project {
                        id: "src".into(),
                        name: "Source".into(),
                        region: "eu-west-1".into(),
                        status: "ACTIVE_HEALTHY".into(),
                    },
                    Project {
                        id: "dst".into(),
                        name: "Destination".into(),
                        region: "eu-west-1".into(),
                        status: "ACTIVE_HEALTHY".into(),
                    },
                ],
                fail: None,
            }))
            .with_cli(Arc::new(FakeCli))
            .build()
    }

    fn app(state: AppState) -> Router {
        router::build_router().with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let app = app(build_state(Arc::new(MemoryStore::new())));
        let res = app
            .oneshot(Request::get(paths::HEALTHZ).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!({"ok": true}));
    }

    #[tokio::test]
    async fn projects_lists_directory_contents() {
        let app = app(build_state(Arc::new(MemoryStore::new())));
        let res = app
            .oneshot(Request::get(paths::PROJECTS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["id"], "src");
    }

    #[tokio::test]
    async fn projects_unauthorized_maps_to_problem() {
        let state = AppState::builder(AppConfig::default())
            .with_store(Arc::new(MemoryStore::new()))
            .with_directory(Arc::new(FakeDirectory {
                projects: Vec::new(),
                fail: Some(ReadError::Unauthorized("token rejected".into())),
            }))
            .with_cli(Arc::new(FakeCli))
            .build();
        let res = app(state)
            .oneshot(Request::get(paths::PROJECTS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(res).await;
        let problem: ProblemDetails = serde_json::from_value(body).unwrap();
        assert_eq!(problem.r#type, "about:blank");
        assert_eq!(problem.title, "Unauthorized");
        assert_eq!(problem.status, 401);
        assert!(problem.detail.is_some());
    }

    #[tokio::test]
    async fn preview_returns_one_block_per_enabled_category() {
        let store = Arc::new(MemoryStore::new());
        store.seed("src", Category::Auth, [("site_url", "https://a.example")]);
        store.seed("dst", Category::Auth, [("site_url", "https://b.example")]);
        let app = app(build_state(store));

        let res = app
            .oneshot(post_json(
                paths::PREVIEW,
                json!({"source_id": "src", "dest_id": "dst", "config_items": [true]}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        let blocks = body.as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["name"], "auth");
        assert_eq!(blocks[0]["diffs"][0]["key"], "site_url");
    }

    #[tokio::test]
    async fn preview_rejects_oversized_selection() {
        let app = app(build_state(Arc::new(MemoryStore::new())));
        let flags: Vec<bool> = vec![true; Category::ALL.len() + 1];
        let res = app
            .oneshot(post_json(
                paths::PREVIEW,
                json!({"source_id": "src", "dest_id": "dst", "config_items": flags}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn preview_conflicts_while_pair_is_busy() {
        let state = build_state(Arc::new(MemoryStore::new()));
        let _guard = state.runs().begin("src", "dst", RunKind::Migrate).unwrap();
        let res = app(state)
            .oneshot(post_json(
                paths::PREVIEW,
                json!({"source_id": "src", "dest_id": "dst", "config_items": [true]}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body = body_json(res).await;
        assert_eq!(body["title"], "Run Already Active");
    }

    #[tokio::test]
    async fn migrate_annotates_every_entry() {
        let store = Arc::new(MemoryStore::new());
        store.seed("src", Category::Auth, [("site_url", "https://a.example")]);
        store.seed("dst", Category::Auth, [("site_url", "https://b.example")]);
        let app = app(build_state(Arc::clone(&store)));

        let config = ProjectConfig::new(
            Category::Auth,
            vec![confmig_protocol::DiffEntry::new(
                "site_url",
                Some("https://a.example".into()),
                Some("https://b.example".into()),
            )],
        );

        let res = app
            .oneshot(post_json(
                paths::MIGRATE,
                json!({
                    "source_id": "src",
                    "dest_id": "dst",
                    "project_config": [config],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body[0]["diffs"][0]["outcome"]["result"], "applied");
        assert_eq!(
            store.value("dst", Category::Auth, "site_url").as_deref(),
            Some("https://a.example")
        );
    }

    #[tokio::test]
    async fn migrate_skips_entries_touched_since_preview() {
        let store = Arc::new(MemoryStore::new());
        store.seed("src", Category::Auth, [("site_url", "https://a.example")]);
        // Destination drifted after the preview that produced this entry.
        store.seed("dst", Category::Auth, [("site_url", "https://drift.example")]);
        let app = app(build_state(Arc::clone(&store)));

        let config = ProjectConfig::new(
            Category::Auth,
            vec![confmig_protocol::DiffEntry::new(
                "site_url",
                Some("https://a.example".into()),
                Some("https://b.example".into()),
            )],
        );

        let res = app
            .oneshot(post_json(
                paths::MIGRATE,
                json!({
                    "source_id": "src",
                    "dest_id": "dst",
                    "project_config": [config],
                }),
            ))
            .await
            .unwrap();
        let body = body_json(res).await;
        assert_eq!(body[0]["diffs"][0]["outcome"]["result"], "skipped");
        assert_eq!(
            body[0]["diffs"][0]["outcome"]["reason"],
            serde_json::to_value(SkipReason::ConcurrentModification).unwrap()
        );
        // The drifted value must survive untouched.
        assert_eq!(
            store.value("dst", Category::Auth, "site_url").as_deref(),
            Some("https://drift.example")
        );
    }

    #[tokio::test]
    async fn cli_success_returns_output() {
        let app = app(build_state(Arc::new(MemoryStore::new())));
        let res = app
            .oneshot(post_json(
                paths::CLI,
                json!({"command": "db push", "db_string": "postgres://x"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["output"], "ran: db push");
    }

    #[tokio::test]
    async fn cli_failure_maps_to_problem() {
        let app = app(build_state(Arc::new(MemoryStore::new())));
        let res = app
            .oneshot(post_json(
                paths::CLI,
                json!({"command": "fail hard", "db_string": "postgres://x"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(res).await;
        assert_eq!(body["title"], "CLI Command Failed");
    }

    #[tokio::test]
    async fn run_lifecycle_events_reach_bus_subscribers() {
        let store = Arc::new(MemoryStore::new());
        store.seed("src", Category::Auth, [("site_url", "https://a.example")]);
        store.seed("dst", Category::Auth, [("site_url", "https://b.example")]);
        let bus = Bus::new(16);
        let state = AppState::builder(AppConfig::default())
            .with_bus(bus.clone())
            .with_store(store)
            .with_directory(Arc::new(FakeDirectory {
                projects: Vec::new(),
                fail: None,
            }))
            .with_cli(Arc::new(FakeCli))
            .build();
        let mut rx = bus.subscribe();

        let res = app(state)
            .oneshot(post_json(
                paths::PREVIEW,
                json!({"source_id": "src", "dest_id": "dst", "config_items": [true]}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let started = rx.recv().await.expect("run.started envelope");
        assert_eq!(started.kind, topics::TOPIC_RUN_STARTED);
        assert_eq!(started.payload["source_id"], "src");
        let completed = rx.recv().await.expect("run.completed envelope");
        assert_eq!(completed.kind, topics::TOPIC_RUN_COMPLETED);
        assert_eq!(completed.payload["categories"], 1);
    }

    #[tokio::test]
    async fn events_endpoint_opens_an_sse_stream() {
        let app = app(build_state(Arc::new(MemoryStore::new())));
        let res = app
            .oneshot(Request::get(paths::EVENTS).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = app(build_state(Arc::new(MemoryStore::new())));
        let res = app
            .oneshot(Request::get(paths::OPENAPI).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert!(body["paths"]["/preview"].is_object());
    }
}

use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Comma-separated topic prefixes, e.g. `run.,migrate.`; empty
    /// subscribes to everything.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Server-sent events feed of the service bus: run lifecycle, per-category
/// migration results and metrics observation transitions.
#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    params(("prefix" = Option<String>, Query, description = "Comma-separated topic prefixes")),
    responses((status = 200, description = "SSE stream of event envelopes"))
)]
pub async fn events_sse(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let prefixes: Vec<String> = query
        .prefix
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let mut bus_rx = state.bus().subscribe();
    let (tx, rx) = tokio::sync::mpsc::channel(64);
    tokio::spawn(async move {
        while let Ok(env) = bus_rx.recv().await {
            if prefixes.is_empty() || prefixes.iter().any(|p| env.kind.starts_with(p)) {
                if tx.send(env).await.is_err() {
                    break;
                }
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|env| {
        let data = serde_json::to_string(&env).unwrap_or_else(|_| "{}".to_string());
        Result::<SseEvent, std::convert::Infallible>::Ok(
            SseEvent::default().event(env.kind).data(data),
        )
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keep-alive"),
    )
}

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::{debug, warn};

use confmig_core::stream::{Observation, ObservationManager, ObservationState};
use confmig_events::topics;
use confmig_protocol::MetricSample;

use crate::app_state::AppState;

/// First client frame (and any later frame) selecting the observed
/// project. Sending a new frame switches the observation; the previous
/// one is stopped before the replacement starts polling.
#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    project_ref: String,
    #[serde(default)]
    refresh_secs: Option<u64>,
}

/// Live metrics stream. Plain GET upgrades to a WebSocket; the client's
/// first text frame carries the project selection.
#[utoipa::path(
    get,
    path = "/ws/metrics",
    tag = "Metrics",
    responses((status = 101, description = "Switching to WebSocket"))
)]
pub async fn metrics_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_metrics(state, socket))
}

async fn serve_metrics(state: AppState, mut socket: WebSocket) {
    let mut manager = ObservationManager::new(state.transport(), state.config().stream_config());

    // Handshake: nothing streams until the client names a project.
    let mut request = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<SubscribeRequest>(&text)
            {
                Ok(req) => break req,
                Err(err) => {
                    debug!(%err, "rejecting malformed subscribe frame");
                    let _ = socket
                        .send(Message::Text(
                            serde_json::json!({"error": "expected {\"project_ref\": ...}"})
                                .to_string()
                                .into(),
                        ))
                        .await;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!(%err, "websocket receive failed during handshake");
                return;
            }
        }
    };

    loop {
        subscribe(&state, &mut manager, &request).await;
        let Some(observation) = manager.current() else {
            break;
        };
        match stream_session(&mut socket, observation, &state).await {
            SessionEnd::Switch(next) => request = next,
            SessionEnd::Closed => break,
        }
    }
    manager.unsubscribe().await;
}

async fn subscribe(state: &AppState, manager: &mut ObservationManager, req: &SubscribeRequest) {
    let mut config = state.config().stream_config();
    if let Some(secs) = req.refresh_secs {
        config.refresh = Duration::from_secs(secs.max(1));
    }
    manager.subscribe_with(&req.project_ref, config).await;
    state.bus().publish(
        topics::TOPIC_OBSERVATION_STATE,
        &serde_json::json!({
            "project_ref": req.project_ref,
            "state": ObservationState::Connecting,
        }),
    );
}

enum SessionEnd {
    Switch(SubscribeRequest),
    Closed,
}

/// Pump one observation into the socket until the client switches
/// projects, either side closes, or the observation gives up.
async fn stream_session(
    socket: &mut WebSocket,
    observation: &mut Observation,
    state: &AppState,
) -> SessionEnd {
    let mut states = observation.state_changes();
    let mut states_open = true;
    loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<SubscribeRequest>(&text) {
                        Ok(req) => return SessionEnd::Switch(req),
                        Err(err) => debug!(%err, "ignoring malformed frame mid-stream"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%err, "websocket receive failed");
                    return SessionEnd::Closed;
                }
            },
            sample = observation.recv() => match sample {
                Some(first) => {
                    let mut batch = vec![first];
                    while let Some(more) = observation.try_recv() {
                        batch.push(more);
                    }
                    if send_batch(socket, &batch).await.is_err() {
                        return SessionEnd::Closed;
                    }
                }
                // Channel closed: retries exhausted, observation is done.
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    return SessionEnd::Closed;
                }
            },
            changed = states.changed(), if states_open => {
                if changed.is_err() {
                    states_open = false;
                    continue;
                }
                let current = *states.borrow_and_update();
                if current == ObservationState::Reconnecting {
                    metrics::counter!("confmig_stream_reconnects_total").increment(1);
                }
                state.bus().publish(
                    topics::TOPIC_OBSERVATION_STATE,
                    &serde_json::json!({
                        "project_ref": observation.project_ref(),
                        "state": current,
                    }),
                );
                let frame = serde_json::json!({"status": current});
                if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                    return SessionEnd::Closed;
                }
            }
        }
    }
}

async fn send_batch(socket: &mut WebSocket, batch: &[MetricSample]) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(batch).unwrap_or_else(|err| {
        warn!(%err, "metric batch serialization failed");
        "[]".to_string()
    });
    socket.send(Message::Text(payload.into())).await
}

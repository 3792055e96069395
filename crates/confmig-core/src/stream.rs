//! Live metrics observations: one long-lived transport per observed
//! project, a bounded hand-off to the consumer, and a fixed-interval
//! reconnect loop with a capped retry budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confmig_protocol::MetricSample;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("stream closed: {0}")]
    Closed(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Duplex metrics channel to the backend. `connect` performs the
/// handshake and sends the subscribed project reference before returning.
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    async fn connect(&self, project_ref: &str)
        -> Result<Box<dyn MetricsConnection>, TransportError>;
}

/// One live connection. `next_batch` yields inbound samples in arrival
/// order and fails on transport error or unexpected close.
#[async_trait]
pub trait MetricsConnection: Send {
    async fn next_batch(&mut self) -> Result<Vec<MetricSample>, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationState {
    Disconnected,
    Connecting,
    Streaming,
    Reconnecting,
}

impl ObservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationState::Disconnected => "disconnected",
            ObservationState::Connecting => "connecting",
            ObservationState::Streaming => "streaming",
            ObservationState::Reconnecting => "reconnecting",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Fixed reconnect cadence; defaults to the client refresh period.
    pub refresh: Duration,
    /// Bounded hand-off capacity; a slow consumer back-pressures the
    /// read loop rather than growing memory.
    pub buffer: usize,
    /// Consecutive failures (connects or streams that never delivered)
    /// tolerated before the observation gives up.
    pub max_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(60),
            buffer: 128,
            max_attempts: 5,
        }
    }
}

/// One live subscription for a single project reference. Terminal once
/// stopped; a new subscribe starts a fresh observation.
pub struct Observation {
    project_ref: String,
    samples: mpsc::Receiver<MetricSample>,
    state_rx: watch::Receiver<ObservationState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Observation {
    pub fn spawn(
        transport: Arc<dyn MetricsTransport>,
        project_ref: impl Into<String>,
        config: StreamConfig,
    ) -> Self {
        let project_ref = project_ref.into();
        let (tx, rx) = mpsc::channel(config.buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ObservationState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_observation(
            transport,
            project_ref.clone(),
            config,
            tx,
            state_tx,
            shutdown_rx,
        ));
        Self {
            project_ref,
            samples: rx,
            state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    pub fn project_ref(&self) -> &str {
        &self.project_ref
    }

    /// Next sample in arrival order; `None` once the observation ends.
    pub async fn recv(&mut self) -> Option<MetricSample> {
        self.samples.recv().await
    }

    /// Already-buffered sample, if any; never waits. Lets consumers drain
    /// a burst into one delivery without blocking the hand-off.
    pub fn try_recv(&mut self) -> Option<MetricSample> {
        self.samples.try_recv().ok()
    }

    pub fn state(&self) -> ObservationState {
        *self.state_rx.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ObservationState> {
        self.state_rx.clone()
    }

    /// Deterministic teardown: signals the task, unblocks any pending
    /// hand-off, and waits for the reconnect loop (and its timer) to end.
    pub async fn stop(mut self) {
        self.samples.close();
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Owns at most one live observation (one transport per consumer
/// session); subscribing to a new project tears the previous one down
/// first.
pub struct ObservationManager {
    transport: Arc<dyn MetricsTransport>,
    config: StreamConfig,
    current: Option<Observation>,
}

impl ObservationManager {
    pub fn new(transport: Arc<dyn MetricsTransport>, config: StreamConfig) -> Self {
        Self {
            transport,
            config,
            current: None,
        }
    }

    pub async fn subscribe(&mut self, project_ref: &str) -> &mut Observation {
        let config = self.config.clone();
        self.subscribe_with(project_ref, config).await
    }

    /// Like [`subscribe`](Self::subscribe) but with a one-off config, e.g.
    /// a caller-chosen refresh interval.
    pub async fn subscribe_with(
        &mut self,
        project_ref: &str,
        config: StreamConfig,
    ) -> &mut Observation {
        if let Some(previous) = self.current.take() {
            debug!(
                old = previous.project_ref(),
                new = project_ref,
                "switching metrics observation"
            );
            previous.stop().await;
        }
        let observation = Observation::spawn(Arc::clone(&self.transport), project_ref, config);
        self.current.insert(observation)
    }

    pub async fn unsubscribe(&mut self) {
        if let Some(observation) = self.current.take() {
            observation.stop().await;
        }
    }

    pub fn current(&mut self) -> Option<&mut Observation> {
        self.current.as_mut()
    }
}

async fn run_observation(
    transport: Arc<dyn MetricsTransport>,
    project_ref: String,
    config: StreamConfig,
    tx: mpsc::Sender<MetricSample>,
    state: watch::Sender<ObservationState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures = 0u32;
    'observe: loop {
        let _ = state.send(ObservationState::Connecting);
        let connected = tokio::select! {
            _ = shutdown.changed() => break 'observe,
            res = transport.connect(&project_ref) => res,
        };
        match connected {
            Ok(mut conn) => {
                let _ = state.send(ObservationState::Streaming);
                loop {
                    let batch = tokio::select! {
                        _ = shutdown.changed() => break 'observe,
                        batch = conn.next_batch() => batch,
                    };
                    match batch {
                        Ok(samples) => {
                            failures = 0;
                            for sample in samples {
                                if tx.send(sample).await.is_err() {
                                    // Consumer went away; the observation is over.
                                    break 'observe;
                                }
                            }
                        }
                        Err(err) => {
                            warn!(project = %project_ref, %err, "metrics stream error");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(project = %project_ref, %err, "metrics connect failed");
            }
        }
        failures += 1;
        if failures >= config.max_attempts {
            warn!(project = %project_ref, failures, "metrics retry budget exhausted");
            break;
        }
        let _ = state.send(ObservationState::Reconnecting);
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(config.refresh) => {}
        }
    }
    let _ = state.send(ObservationState::Disconnected);
}

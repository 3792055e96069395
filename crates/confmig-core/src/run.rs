use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// What a run is doing; recorded for logging and event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Preview,
    Migrate,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Preview => "preview",
            RunKind::Migrate => "migrate",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("a run is already active for {source_id} -> {dest_id}")]
    AlreadyActive { source_id: String, dest_id: String },
}

/// Mutual exclusion for preview/migrate runs, keyed by the
/// `(source, dest)` project pair. No queueing: a second caller for an
/// active pair is rejected immediately, since a queued migration against
/// since-changed state would be unsafe.
#[derive(Clone, Default)]
pub struct RunCoordinator {
    active: Arc<Mutex<HashSet<(String, String)>>>,
}

impl RunCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(
        &self,
        source_id: &str,
        dest_id: &str,
        kind: RunKind,
    ) -> Result<RunGuard, RunError> {
        let key = (source_id.to_string(), dest_id.to_string());
        let mut active = self.active.lock().expect("run set lock poisoned");
        if !active.insert(key.clone()) {
            return Err(RunError::AlreadyActive {
                source_id: key.0,
                dest_id: key.1,
            });
        }
        debug!(source = source_id, dest = dest_id, kind = kind.as_str(), "run slot acquired");
        Ok(RunGuard {
            active: Arc::clone(&self.active),
            key,
            kind,
        })
    }
}

/// Holds the pair slot; dropping releases it on every path, so a crashed
/// run can never permanently lock a pair.
#[derive(Debug)]
pub struct RunGuard {
    active: Arc<Mutex<HashSet<(String, String)>>>,
    key: (String, String),
    kind: RunKind,
}

impl RunGuard {
    pub fn kind(&self) -> RunKind {
        self.kind
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().expect("run set lock poisoned");
        active.remove(&self.key);
        debug!(
            source = %self.key.0,
            dest = %self.key.1,
            kind = self.kind.as_str(),
            "run slot released"
        );
    }
}

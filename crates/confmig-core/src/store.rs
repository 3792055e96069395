use async_trait::async_trait;
use confmig_protocol::Category;

use crate::snapshot::SettingsSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReadError {
    /// Network or backend down; the caller may retry.
    #[error("backend unreachable: {0}")]
    UnreachableBackend(String),
    /// Credential problem; retrying without operator action is pointless.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WriteError {
    #[error("backend unreachable: {0}")]
    UnreachableBackend(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Backend refused the value (validation, read-only key, plan limits).
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Abstract per-category settings accessor for one backing store.
///
/// `read` is side-effect free and safe to call repeatedly and concurrently
/// for different projects. Partial reads come back as an `Ok` snapshot
/// with the unfetched keys flagged (see [`SettingsSnapshot::is_partial`]).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn read(
        &self,
        project_id: &str,
        category: Category,
    ) -> Result<SettingsSnapshot, ReadError>;

    /// Current value of a single key, `None` when absent. The default
    /// implementation fetches the whole category; backends with a cheaper
    /// point read should override it.
    async fn read_key(
        &self,
        project_id: &str,
        category: Category,
        key: &str,
    ) -> Result<Option<String>, ReadError> {
        let snapshot = self.read(project_id, category).await?;
        Ok(snapshot.value(key).map(str::to_string))
    }

    /// Write one key at the destination. `None` clears the key, which is
    /// how an absent-on-source entry migrates.
    async fn write(
        &self,
        project_id: &str,
        category: Category,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), WriteError>;
}

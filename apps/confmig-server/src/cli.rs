//! Escape hatch for operations the management API does not cover: run an
//! external CLI command against a project's connection string. Timeout
//! and argument handling live here, outside the engine.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to spawn command: {0}")]
    Spawn(String),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("command exited with status {status}: {stderr}")]
    NonZero { status: i32, stderr: String },
}

#[async_trait]
pub trait CliExecutor: Send + Sync {
    async fn execute(&self, command: &str, connection_string: &str) -> Result<String, CliError>;
}

/// Runs the configured CLI binary as a child process. The command string
/// is split on whitespace into arguments; the connection string is
/// appended as `--db-url` so it never goes through a shell.
pub struct ProcessCliExecutor {
    program: String,
    timeout: Duration,
}

impl ProcessCliExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "supabase".into(),
            timeout,
        }
    }
}

#[async_trait]
impl CliExecutor for ProcessCliExecutor {
    async fn execute(&self, command: &str, connection_string: &str) -> Result<String, CliError> {
        let args: Vec<&str> = command.split_whitespace().collect();
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .arg("--db-url")
            .arg(connection_string)
            .kill_on_drop(true);
        info!(program = %self.program, ?args, "running external CLI command");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(CliError::Spawn(err.to_string())),
            Err(_) => {
                warn!(program = %self.program, "external CLI command timed out");
                return Err(CliError::Timeout(self.timeout));
            }
        };
        if !output.status.success() {
            return Err(CliError::NonZero {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl CliExecutor for EchoExecutor {
        async fn execute(&self, command: &str, conn: &str) -> Result<String, CliError> {
            Ok(format!("{command} @ {conn}"))
        }
    }

    #[tokio::test]
    async fn executor_trait_is_object_safe() {
        let exec: Box<dyn CliExecutor> = Box::new(EchoExecutor);
        let out = exec.execute("db dump", "postgres://x").await.unwrap();
        assert_eq!(out, "db dump @ postgres://x");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_surfaces_as_spawn_error() {
        let exec = ProcessCliExecutor {
            program: "/nonexistent/confmig-test-binary".into(),
            timeout: Duration::from_secs(5),
        };
        let err = exec.execute("status", "postgres://x").await.unwrap_err();
        assert!(matches!(err, CliError::Spawn(_)));
    }
}

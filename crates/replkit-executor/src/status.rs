//! Bounded-wait status checks for promoted tasks.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use replkit_core::{RegistryError, ReplConfig, ShellTask, TaskId, TaskRegistry, TaskStatus};

/// Snapshot of a task's state returned by a status check.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Present once the task is terminal.
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
    /// Run time so far, or total run time once terminal.
    pub elapsed_seconds: f64,
    /// `true` when the poll budget elapsed with the task still running;
    /// a normal outcome, the caller should check again later.
    pub still_running: bool,
}

impl TaskReport {
    fn from_task(task: ShellTask) -> Self {
        let elapsed_seconds = task.elapsed().as_secs_f64();
        if task.status.is_terminal() {
            Self {
                task_id: task.id,
                status: task.status,
                stdout: Some(task.stdout),
                stderr: Some(task.stderr),
                exit_code: task.exit_code,
                elapsed_seconds,
                still_running: false,
            }
        } else {
            Self {
                task_id: task.id,
                status: task.status,
                stdout: None,
                stderr: None,
                exit_code: None,
                elapsed_seconds,
                still_running: true,
            }
        }
    }
}

/// Polls the task registry with a bounded wait.
///
/// Waiting briefly makes nearly-done tasks report their final state on the
/// first check instead of forcing an extra round trip.
pub struct StatusPoller {
    registry: Arc<TaskRegistry>,
    config: ReplConfig,
}

impl StatusPoller {
    /// Create a poller over `registry`.
    #[must_use]
    pub fn new(registry: Arc<TaskRegistry>, config: ReplConfig) -> Self {
        Self { registry, config }
    }

    /// Wait for a task to reach a terminal state, up to the poll budget.
    ///
    /// Returns a terminal report as soon as one is available; once the
    /// budget elapses, returns a `still_running` report with the elapsed
    /// time so far. Safe to call repeatedly; terminal reports are
    /// identical on every call.
    ///
    /// # Errors
    /// `TaskNotFound` for an unknown identifier, checked before any
    /// waiting happens.
    pub async fn wait(&self, id: TaskId) -> Result<TaskReport, RegistryError> {
        let deadline = Instant::now() + self.config.poll_budget;

        loop {
            let task = self
                .registry
                .get(id)
                .ok_or(RegistryError::TaskNotFound(id))?;

            if task.status.is_terminal() {
                return Ok(TaskReport::from_task(task));
            }
            if Instant::now() >= deadline {
                tracing::debug!(%id, "poll budget elapsed, task still running");
                return Ok(TaskReport::from_task(task));
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::command::{CommandExecutor, ExecRequest, Execution};
    use crate::shell::Shell;

    fn setup(poll_budget: Duration) -> (CommandExecutor, StatusPoller) {
        let config = ReplConfig::new()
            .with_sync_threshold(Duration::from_millis(200))
            .with_poll_budget(poll_budget);
        let registry = Arc::new(TaskRegistry::new());
        (
            CommandExecutor::new(Arc::clone(&registry), config.clone()),
            StatusPoller::new(registry, config),
        )
    }

    #[tokio::test]
    async fn unknown_task_fails_immediately() {
        let (_, poller) = setup(Duration::from_secs(5));
        let started = Instant::now();
        let err = poller.wait(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RegistryError::TaskNotFound(_)));
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn short_budget_reports_still_running() {
        let (exec, poller) = setup(Duration::from_millis(400));
        let Execution::Promoted(id) = exec
            .run(ExecRequest::new("sleep 2").with_shell(Shell::Sh))
            .await
            .unwrap()
        else {
            panic!("expected promotion");
        };

        let report = poller.wait(id).await.unwrap();
        assert_eq!(report.status, TaskStatus::Running);
        assert!(report.still_running);
        assert!(report.stdout.is_none());
        assert!(report.elapsed_seconds > 0.0);
    }

    #[tokio::test]
    async fn poll_returns_terminal_result_within_budget() {
        let (exec, poller) = setup(Duration::from_secs(5));
        let Execution::Promoted(id) = exec
            .run(ExecRequest::new("sleep 1; echo finished").with_shell(Shell::Sh))
            .await
            .unwrap()
        else {
            panic!("expected promotion");
        };

        let report = poller.wait(id).await.unwrap();
        assert_eq!(report.status, TaskStatus::Completed);
        assert!(!report.still_running);
        assert_eq!(report.stdout.as_deref(), Some("finished\n"));
        assert_eq!(report.exit_code, Some(0));

        // Terminal reports are stable across repeated checks.
        let again = poller.wait(id).await.unwrap();
        assert_eq!(again.stdout, report.stdout);
        assert_eq!(again.exit_code, report.exit_code);
        assert_eq!(again.elapsed_seconds.to_bits(), report.elapsed_seconds.to_bits());
    }
}

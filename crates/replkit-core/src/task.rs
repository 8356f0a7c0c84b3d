//! Background command tracking.
//!
//! A [`ShellTask`] is created only when a command outlives the sync
//! threshold; fast commands reply directly and never appear here. Once
//! registered, a task is mutated exactly once, by the completion handler
//! that observed the process exit.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Task identifier.
pub type TaskId = Uuid;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The process is still executing.
    Running,
    /// The process exited with code zero.
    Completed,
    /// The process exited non-zero or could not be waited on.
    Failed,
    /// Reserved for a supervision cap; the base executor never sets this.
    TimedOut,
}

impl TaskStatus {
    /// Whether this status admits no further transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// Final output of a finished command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed: Duration,
}

/// A tracked record of one promoted command execution.
#[derive(Debug, Clone)]
pub struct ShellTask {
    /// Unique task identifier.
    pub id: TaskId,
    /// The exact command string submitted.
    pub command: String,
    /// Current status.
    pub status: TaskStatus,
    /// Process launch time (Unix epoch seconds).
    pub started_at: i64,
    /// Process exit time (Unix epoch seconds), absent while running.
    pub finished_at: Option<i64>,
    /// Monotonic launch instant, for elapsed-time math.
    pub launched: Instant,
    /// Captured standard output; frozen once terminal.
    pub stdout: String,
    /// Captured standard error; frozen once terminal.
    pub stderr: String,
    /// Exit code, set only on terminal states.
    pub exit_code: Option<i32>,
    /// Wall-clock run time, set on completion.
    pub elapsed: Option<Duration>,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl ShellTask {
    /// Create a running task for a command launched at `launched`.
    #[must_use]
    pub fn running<S: Into<String>>(command: S, launched: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            status: TaskStatus::Running,
            started_at: now(),
            finished_at: None,
            launched,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            elapsed: None,
        }
    }

    /// Wall-clock time since launch, or total run time once terminal.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.launched.elapsed())
    }
}

/// Registry error.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("task already terminal: {0}")]
    AlreadyTerminal(TaskId),
}

/// In-memory store of promoted command executions.
///
/// Safe under concurrent access from completion handlers and status
/// pollers; readers get snapshots and never mutate.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, ShellTask>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, returning its identifier.
    pub fn register(&self, task: ShellTask) -> TaskId {
        let id = task.id;
        self.tasks.write().unwrap().insert(id, task);
        id
    }

    /// Snapshot a task by identifier.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<ShellTask> {
        self.tasks.read().unwrap().get(&id).cloned()
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().unwrap().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.read().unwrap().is_empty()
    }

    /// Transition a task to a terminal state in one atomic write.
    ///
    /// # Errors
    /// Returns `TaskNotFound` for unknown identifiers and `AlreadyTerminal`
    /// if the task was completed before; the guard makes double-completion
    /// a no-op for the record.
    pub fn complete(
        &self,
        id: TaskId,
        status: TaskStatus,
        output: CommandOutput,
    ) -> Result<(), RegistryError> {
        debug_assert!(status.is_terminal());

        let mut tasks = self.tasks.write().unwrap();
        let task = tasks.get_mut(&id).ok_or(RegistryError::TaskNotFound(id))?;

        if task.status.is_terminal() {
            return Err(RegistryError::AlreadyTerminal(id));
        }

        task.status = status;
        task.finished_at = Some(now());
        task.stdout = output.stdout;
        task.stderr = output.stderr;
        task.exit_code = Some(output.exit_code);
        task.elapsed = Some(output.elapsed);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(exit_code: i32) -> CommandOutput {
        CommandOutput {
            stdout: "out".to_string(),
            stderr: String::new(),
            exit_code,
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn register_and_get_roundtrip() {
        let registry = TaskRegistry::new();
        let id = registry.register(ShellTask::running("sleep 10", Instant::now()));

        let task = registry.get(id).unwrap();
        assert_eq!(task.command, "sleep 10");
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.exit_code.is_none());
        assert!(task.finished_at.is_none());
    }

    #[test]
    fn unknown_id_is_none() {
        let registry = TaskRegistry::new();
        assert!(registry.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn complete_freezes_output() {
        let registry = TaskRegistry::new();
        let id = registry.register(ShellTask::running("make", Instant::now()));

        registry
            .complete(id, TaskStatus::Completed, finished(0))
            .unwrap();

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.stdout, "out");
        assert_eq!(task.exit_code, Some(0));
        assert!(task.finished_at.is_some());
        assert_eq!(task.elapsed(), Duration::from_millis(10));
    }

    #[test]
    fn double_complete_is_rejected() {
        let registry = TaskRegistry::new();
        let id = registry.register(ShellTask::running("make", Instant::now()));

        registry
            .complete(id, TaskStatus::Failed, finished(2))
            .unwrap();
        let err = registry
            .complete(id, TaskStatus::Completed, finished(0))
            .unwrap_err();

        assert!(matches!(err, RegistryError::AlreadyTerminal(got) if got == id));
        // The first write stands.
        assert_eq!(registry.get(id).unwrap().exit_code, Some(2));
    }

    #[test]
    fn complete_unknown_task_errors() {
        let registry = TaskRegistry::new();
        let err = registry
            .complete(Uuid::new_v4(), TaskStatus::Completed, finished(0))
            .unwrap_err();
        assert!(matches!(err, RegistryError::TaskNotFound(_)));
    }
}

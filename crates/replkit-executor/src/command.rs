//! The command executor.
//!
//! A command is spawned once; a drain task owns its pipes and produces the
//! final [`CommandOutput`]. The foreground races that task's join handle
//! against the sync threshold. `timeout` polls the handle before checking
//! the deadline, so a completion observed to happen-before threshold expiry
//! always takes the synchronous path; otherwise the command is promoted: a
//! `Running` task is registered and a completion handler adopts the same
//! join handle and performs the single terminal registry write.

use std::{
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use thiserror::Error;
use tokio::{
    io::AsyncReadExt,
    process::{Child, Command},
    task::JoinHandle,
};

use replkit_core::{CommandOutput, ReplConfig, ShellTask, TaskId, TaskRegistry, TaskStatus};

use crate::shell::{Shell, default_working_dir};

/// Executor error. Everything here is synchronous and pre-promotion:
/// once a task id has been handed out, failures surface through the
/// task's terminal state instead.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A command execution request.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Command string, passed to the shell as a single `-c` argument.
    pub command: String,
    /// Shell to run under.
    pub shell: Shell,
    /// Working directory; defaults to the user's home directory.
    pub working_dir: Option<PathBuf>,
}

impl ExecRequest {
    /// Create a request with the default shell and working directory.
    #[must_use]
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            shell: Shell::default(),
            working_dir: None,
        }
    }

    /// Select the shell.
    #[must_use]
    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Outcome of [`CommandExecutor::run`].
#[derive(Debug)]
pub enum Execution {
    /// The command finished within the sync threshold.
    Completed(CommandOutput),
    /// The command was promoted; poll the registry with this id.
    Promoted(TaskId),
}

/// Runs commands, promoting slow ones into the task registry.
pub struct CommandExecutor {
    registry: Arc<TaskRegistry>,
    config: ReplConfig,
}

impl CommandExecutor {
    /// Create an executor backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<TaskRegistry>, config: ReplConfig) -> Self {
        Self { registry, config }
    }

    /// The backing registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Execute a command.
    ///
    /// Returns `Execution::Completed` when the process exits within the
    /// sync threshold; `Execution::Promoted` with a registered task id
    /// otherwise. The promoted process keeps running to its natural
    /// completion and the registry entry is updated exactly once when it
    /// exits.
    ///
    /// # Errors
    /// `Configuration` for a missing working directory or unresolvable
    /// shell, `Spawn` when the OS refuses the process. Nothing is
    /// registered on these paths.
    pub async fn run(&self, request: ExecRequest) -> Result<Execution, ExecError> {
        if request.command.trim().is_empty() {
            return Err(ExecError::Configuration("command is empty".to_string()));
        }

        let working_dir = request
            .working_dir
            .clone()
            .unwrap_or_else(default_working_dir);
        match tokio::fs::metadata(&working_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ExecError::Configuration(format!(
                    "working directory is not a directory: {}",
                    working_dir.display()
                )));
            }
            Err(_) => {
                return Err(ExecError::Configuration(format!(
                    "working directory does not exist: {}",
                    working_dir.display()
                )));
            }
        }

        let shell_path = request.shell.resolve().await.ok_or_else(|| {
            ExecError::Configuration(format!("shell not found: {}", request.shell))
        })?;

        let launched = Instant::now();
        let child = Command::new(shell_path)
            .arg("-c")
            .arg(&request.command)
            .current_dir(&working_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(ExecError::Spawn)?;

        tracing::debug!(command = %request.command, pid = child.id(), "spawned command");

        let mut wait = tokio::spawn(drain_to_completion(child, launched));

        match tokio::time::timeout(self.config.sync_threshold, &mut wait).await {
            Ok(Ok(output)) => Ok(Execution::Completed(output)),
            Ok(Err(join_err)) => Err(ExecError::Io(std::io::Error::other(format!(
                "command supervisor failed: {join_err}"
            )))),
            Err(_elapsed) => Ok(Execution::Promoted(self.promote(
                &request.command,
                launched,
                wait,
            ))),
        }
    }

    /// Register a running task and hand its supervision to a background
    /// completion handler.
    fn promote(
        &self,
        command: &str,
        launched: Instant,
        wait: JoinHandle<CommandOutput>,
    ) -> TaskId {
        let id = self.registry.register(ShellTask::running(command, launched));
        tracing::info!(%id, command, "command exceeded sync threshold, promoted to background task");

        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            let (status, output) = match wait.await {
                Ok(output) => {
                    let status = if output.exit_code == 0 {
                        TaskStatus::Completed
                    } else {
                        TaskStatus::Failed
                    };
                    (status, output)
                }
                Err(join_err) => (
                    TaskStatus::Failed,
                    CommandOutput {
                        stdout: String::new(),
                        stderr: format!("error waiting for command: {join_err}"),
                        exit_code: -1,
                        elapsed: launched.elapsed(),
                    },
                ),
            };

            tracing::info!(%id, exit_code = output.exit_code, ?status, "background task finished");
            if let Err(err) = registry.complete(id, status, output) {
                tracing::warn!(%id, %err, "failed to record task completion");
            }
        });

        id
    }
}

/// Wait for the child to exit, draining both pipes fully.
///
/// This task has exclusive ownership of the pipes; wait errors and
/// signal-terminated exits are folded into the output with exit code -1.
async fn drain_to_completion(mut child: Child, launched: Instant) -> CommandOutput {
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let (stdout, mut stderr) = futures::join!(read_pipe(stdout_pipe), read_pipe(stderr_pipe));

    let exit_code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&format!("error waiting for command: {err}"));
            -1
        }
    };

    CommandOutput {
        stdout,
        stderr,
        exit_code,
        elapsed: launched.elapsed(),
    }
}

async fn read_pipe<R: tokio::io::AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fast_config() -> ReplConfig {
        ReplConfig::new().with_sync_threshold(Duration::from_millis(300))
    }

    fn executor(config: ReplConfig) -> CommandExecutor {
        CommandExecutor::new(Arc::new(TaskRegistry::new()), config)
    }

    #[tokio::test]
    async fn fast_command_replies_synchronously() {
        let exec = executor(ReplConfig::default());
        let request = ExecRequest::new("echo hello").with_shell(Shell::Sh);

        let Execution::Completed(output) = exec.run(request).await.unwrap() else {
            panic!("expected synchronous completion");
        };

        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.exit_code, 0);
        assert!(output.elapsed < Duration::from_secs(4));
        // Fast commands never touch the registry.
        assert!(exec.registry().is_empty());
    }

    #[tokio::test]
    async fn sync_elapsed_tracks_wall_clock() {
        let exec = executor(ReplConfig::default());
        let request = ExecRequest::new("sleep 1").with_shell(Shell::Sh);

        let Execution::Completed(output) = exec.run(request).await.unwrap() else {
            panic!("expected synchronous completion");
        };

        assert_eq!(output.exit_code, 0);
        assert!(output.elapsed >= Duration::from_millis(950));
        assert!(output.elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code_synchronously() {
        let exec = executor(ReplConfig::default());
        let request = ExecRequest::new("echo oops >&2; exit 3").with_shell(Shell::Sh);

        let Execution::Completed(output) = exec.run(request).await.unwrap() else {
            panic!("expected synchronous completion");
        };

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn slow_command_is_promoted_and_completes_in_background() {
        let exec = executor(fast_config());
        let request = ExecRequest::new("sleep 1; echo done").with_shell(Shell::Sh);

        let started = Instant::now();
        let Execution::Promoted(id) = exec.run(request).await.unwrap() else {
            panic!("expected promotion");
        };
        // The id comes back within the threshold window, not after the
        // command finishes.
        assert!(started.elapsed() < Duration::from_millis(900));

        let task = exec.registry().get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.stdout.is_empty());

        // The process runs to completion with no one polling.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let task = exec.registry().get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.stdout, "done\n");
        assert_eq!(task.exit_code, Some(0));
        assert!(task.finished_at.is_some());
        assert!(task.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn promoted_failure_lands_in_terminal_state() {
        let exec = executor(fast_config());
        let request = ExecRequest::new("sleep 1; exit 9").with_shell(Shell::Sh);

        let Execution::Promoted(id) = exec.run(request).await.unwrap() else {
            panic!("expected promotion");
        };

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let task = exec.registry().get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.exit_code, Some(9));
    }

    #[tokio::test]
    async fn missing_working_dir_fails_before_spawn() {
        let exec = executor(ReplConfig::default());
        let request = ExecRequest::new("echo hi")
            .with_shell(Shell::Sh)
            .with_working_dir("/nonexistent/path/for/replkit");

        let err = exec.run(request).await.unwrap_err();
        assert!(matches!(err, ExecError::Configuration(_)));
        assert!(exec.registry().is_empty());
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let exec = executor(ReplConfig::default());
        let err = exec.run(ExecRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, ExecError::Configuration(_)));
    }
}

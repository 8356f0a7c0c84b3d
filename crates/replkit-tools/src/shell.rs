//! The `shell` and `shell_status` tools.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use replkit_core::{RegistryError, Tool, ToolError, ToolReply};
use replkit_executor::{
    CommandExecutor, ExecError, ExecRequest, Execution, Shell, StatusPoller, TaskReport,
};

use crate::render::Sections;

fn exec_error(err: ExecError) -> ToolError {
    match err {
        ExecError::Configuration(msg) => ToolError::Configuration(msg),
        other => ToolError::Execution(other.to_string()),
    }
}

/// Execute shell commands with automatic async fallback.
pub struct ShellTool {
    executor: Arc<CommandExecutor>,
}

#[derive(Deserialize)]
struct ShellArgs {
    command: String,
    #[serde(default)]
    shell: Shell,
    #[serde(default)]
    working_dir: Option<PathBuf>,
}

impl ShellTool {
    /// Create the tool over an executor.
    #[must_use]
    pub fn new(executor: Arc<CommandExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn description(&self) -> &'static str {
        "Execute shell commands with automatic async fallback.\n\n\
         If the command completes within the sync threshold you get the result \
         immediately. If it takes longer, you get a task ID to check with \
         shell_status while the command keeps running in the background."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "shell": {
                    "type": "string",
                    "description": "Shell to use",
                    "enum": ["bash", "sh", "zsh"],
                    "default": "bash"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Working directory (defaults to user home)"
                }
            },
            "required": ["command"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply, ToolError> {
        let args: ShellArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.command.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "missing command parameter".to_string(),
            ));
        }

        let mut request = ExecRequest::new(args.command).with_shell(args.shell);
        if let Some(dir) = args.working_dir {
            request = request.with_working_dir(dir);
        }

        match self.executor.run(request).await.map_err(exec_error)? {
            Execution::Completed(output) => {
                let mut sections = Sections::new();
                sections.push_block("Standard Output", &output.stdout);
                sections.push_block("Standard Error", &output.stderr);
                sections.push_elapsed(output.elapsed);
                sections.push(format!("Return Value:\n{}", output.exit_code));
                Ok(ToolReply::text(sections.finish()))
            }
            Execution::Promoted(id) => Ok(ToolReply::text(format!(
                "Task started with ID: {id}\nUse shell_status with this task ID to check progress."
            ))),
        }
    }
}

/// Check the status of a promoted shell command.
pub struct ShellStatusTool {
    poller: Arc<StatusPoller>,
}

#[derive(Deserialize)]
struct ShellStatusArgs {
    task_id: String,
}

impl ShellStatusTool {
    /// Create the tool over a poller.
    #[must_use]
    pub fn new(poller: Arc<StatusPoller>) -> Self {
        Self { poller }
    }

    fn render(report: &TaskReport) -> String {
        let mut sections = Sections::new();
        sections.push(format!("Status: {}", report.status));

        if report.still_running {
            sections.push(format!("Elapsed time: {:.4} seconds", report.elapsed_seconds));
            sections.push("Still running: check again with shell_status.");
            return sections.finish();
        }

        sections.push(format!("Execution time: {:.4} seconds", report.elapsed_seconds));
        if let Some(stdout) = &report.stdout {
            sections.push_block("Standard Output", stdout);
        }
        if let Some(stderr) = &report.stderr {
            sections.push_block("Standard Error", stderr);
        }
        if let Some(code) = report.exit_code {
            sections.push(format!("Return Value:\n{code}"));
        }
        sections.finish()
    }
}

#[async_trait]
impl Tool for ShellStatusTool {
    fn name(&self) -> &'static str {
        "shell_status"
    }

    fn description(&self) -> &'static str {
        "Check the status of a shell command that switched to async mode.\n\
         Provide the task ID that was returned by the shell command.\n\
         Waits up to the poll budget for the task to finish."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Task ID from the shell command"
                }
            },
            "required": ["task_id"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply, ToolError> {
        let args: ShellStatusArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let id = Uuid::parse_str(&args.task_id)
            .map_err(|_| ToolError::InvalidArguments(format!("malformed task id: {}", args.task_id)))?;

        let report = self.poller.wait(id).await.map_err(|err| match err {
            RegistryError::TaskNotFound(id) => ToolError::TaskNotFound(id),
            RegistryError::AlreadyTerminal(id) => ToolError::Execution(format!(
                "task unexpectedly reported terminal twice: {id}"
            )),
        })?;

        Ok(ToolReply::text(Self::render(&report)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use replkit_core::{ReplConfig, TaskRegistry};

    use super::*;

    fn tools(config: ReplConfig) -> (ShellTool, ShellStatusTool) {
        let registry = Arc::new(TaskRegistry::new());
        (
            ShellTool::new(Arc::new(CommandExecutor::new(
                Arc::clone(&registry),
                config.clone(),
            ))),
            ShellStatusTool::new(Arc::new(StatusPoller::new(registry, config))),
        )
    }

    #[tokio::test]
    async fn fast_command_renders_sections() {
        let (shell, _) = tools(ReplConfig::default());
        let reply = shell
            .invoke(serde_json::json!({ "command": "echo hello", "shell": "sh" }))
            .await
            .unwrap();

        assert!(reply.text.starts_with("Standard Output:\nhello"));
        assert!(reply.text.contains("Execution time: "));
        assert!(reply.text.ends_with("Return Value:\n0"));
    }

    #[tokio::test]
    async fn slow_command_hands_back_a_task_id_and_status_follows() {
        let config = ReplConfig::new().with_sync_threshold(Duration::from_millis(200));
        let (shell, status) = tools(config);

        let reply = shell
            .invoke(serde_json::json!({ "command": "sleep 1; echo done", "shell": "sh" }))
            .await
            .unwrap();
        let id = reply
            .text
            .strip_prefix("Task started with ID: ")
            .and_then(|rest| rest.lines().next())
            .unwrap()
            .to_string();

        let reply = status
            .invoke(serde_json::json!({ "task_id": id }))
            .await
            .unwrap();
        assert!(reply.text.starts_with("Status: completed"));
        assert!(reply.text.contains("Standard Output:\ndone"));
        assert!(reply.text.contains("Return Value:\n0"));
    }

    #[tokio::test]
    async fn unknown_task_id_fails() {
        let (_, status) = tools(ReplConfig::default());
        let err = status
            .invoke(serde_json::json!({ "task_id": Uuid::new_v4().to_string() }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn malformed_task_id_is_invalid_arguments() {
        let (_, status) = tools(ReplConfig::default());
        let err = status
            .invoke(serde_json::json!({ "task_id": "not-a-uuid" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn missing_command_is_invalid_arguments() {
        let (shell, _) = tools(ReplConfig::default());
        let err = shell
            .invoke(serde_json::json!({ "command": "" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}

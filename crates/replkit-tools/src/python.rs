//! The `python` and `python_session` tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use replkit_core::{Tool, ToolError, ToolReply};
use replkit_executor::{ExecError, PythonRequest, run_python};
use replkit_session::{SessionError, SessionManager};

use crate::render::Sections;

/// Execute Python code in a fresh sandboxed interpreter.
pub struct PythonTool {
    python_bin: String,
}

#[derive(Deserialize)]
struct PythonArgs {
    code: String,
    #[serde(default)]
    python_path: Option<String>,
}

impl PythonTool {
    /// Create the tool with a default interpreter binary.
    #[must_use]
    pub fn new<S: Into<String>>(python_bin: S) -> Self {
        Self {
            python_bin: python_bin.into(),
        }
    }
}

#[async_trait]
impl Tool for PythonTool {
    fn name(&self) -> &'static str {
        "python"
    }

    fn description(&self) -> &'static str {
        "Execute Python code in a sandboxed environment with timing information.\n\n\
         Best for quick one-off execution: every call gets a fresh interpreter, \
         nothing persists between runs. A trailing expression is echoed like in \
         a REPL."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python code to execute"
                },
                "python_path": {
                    "type": "string",
                    "description": "Optional path to a Python executable"
                }
            },
            "required": ["code"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply, ToolError> {
        let args: PythonArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.code.is_empty() {
            return Err(ToolError::InvalidArguments(
                "missing code parameter".to_string(),
            ));
        }

        let overridden = args.python_path.clone();
        let mut request = PythonRequest::new(args.code);
        if let Some(path) = args.python_path {
            request = request.with_python_path(path);
        }

        let output = run_python(request, &self.python_bin)
            .await
            .map_err(|err| match err {
                ExecError::Configuration(msg) => ToolError::Configuration(msg),
                other => ToolError::Execution(other.to_string()),
            })?;

        let mut sections = Sections::new();
        if let Some(path) = overridden {
            sections.push(format!("Using Python: {path}"));
        }
        sections.push_elapsed(output.elapsed);
        sections.push_block("Standard Output", &output.stdout);
        sections.push_block("Standard Error", &output.stderr);
        if let Some(value) = output.value {
            sections.push(format!("Result: {value}"));
        }
        Ok(ToolReply::text(sections.finish()))
    }
}

/// Execute Python code in a persistent interpreter session.
pub struct PythonSessionTool {
    manager: Arc<SessionManager>,
}

#[derive(Deserialize)]
struct PythonSessionArgs {
    #[serde(default)]
    session_id: Option<String>,
    code: String,
}

impl PythonSessionTool {
    /// Create the tool over a session manager.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for PythonSessionTool {
    fn name(&self) -> &'static str {
        "python_session"
    }

    fn description(&self) -> &'static str {
        "Execute Python code in a persistent interpreter session.\n\n\
         State is maintained between executions: variables, imports and \
         definitions from earlier calls stay available. Sessions expire \
         after five minutes of inactivity. Pass \"new\" (or omit session_id) \
         to start a session; reuse the returned id to continue it."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session ID, or \"new\" to create a session"
                },
                "code": {
                    "type": "string",
                    "description": "Python code to execute"
                }
            },
            "required": ["code"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply, ToolError> {
        let args: PythonSessionArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.code.is_empty() {
            return Err(ToolError::InvalidArguments(
                "missing code parameter".to_string(),
            ));
        }

        let mut created = None;
        let id = match args.session_id.as_deref() {
            None | Some("") | Some("new") => {
                let id = self
                    .manager
                    .create_session()
                    .await
                    .map_err(|e| ToolError::Execution(e.to_string()))?;
                created = Some(id);
                id
            }
            Some(raw) => Uuid::parse_str(raw)
                .map_err(|_| ToolError::InvalidArguments(format!("malformed session id: {raw}")))?,
        };

        let execution = self
            .manager
            .execute(id, &args.code)
            .await
            .map_err(|err| match err {
                SessionError::NotFound(id) => ToolError::SessionNotFound(id),
                SessionError::Interpreter(e) => ToolError::Execution(e.to_string()),
            })?;

        let mut sections = Sections::new();
        if let Some(id) = created {
            sections.push(format!("Created new session: {id}"));
        }
        sections.push(format!("Session: {id}"));
        sections.push_elapsed(execution.elapsed);
        sections.push_block("Standard Output", &execution.stdout);
        sections.push_block("Standard Error", &execution.stderr);
        Ok(ToolReply::text(sections.finish()))
    }
}

#[cfg(test)]
mod tests {
    use replkit_core::ReplConfig;

    use super::*;

    fn session_tool() -> PythonSessionTool {
        PythonSessionTool::new(Arc::new(SessionManager::new(ReplConfig::default())))
    }

    fn extract_session_id(reply: &ToolReply) -> String {
        reply
            .text
            .lines()
            .find_map(|line| line.strip_prefix("Created new session: "))
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn one_shot_python_echoes_result() {
        let tool = PythonTool::new("python3");
        let reply = tool
            .invoke(serde_json::json!({ "code": "print('hi')\n40 + 2" }))
            .await
            .unwrap();
        assert!(reply.text.contains("Standard Output:\nhi"));
        assert!(reply.text.contains("Result: 42"));
    }

    #[tokio::test]
    async fn session_state_carries_across_invocations() {
        let tool = session_tool();

        let reply = tool
            .invoke(serde_json::json!({ "session_id": "new", "code": "x = 1" }))
            .await
            .unwrap();
        let id = extract_session_id(&reply);

        let reply = tool
            .invoke(serde_json::json!({ "session_id": id, "code": "x + 1" }))
            .await
            .unwrap();
        assert!(!reply.text.contains("Created new session"));
        assert!(reply.text.contains("Standard Output:\n2"));
    }

    #[tokio::test]
    async fn omitted_session_id_creates_a_session() {
        let tool = session_tool();
        let reply = tool
            .invoke(serde_json::json!({ "code": "1 + 1" }))
            .await
            .unwrap();
        assert!(reply.text.contains("Created new session: "));
        assert!(reply.text.contains("Standard Output:\n2"));
    }

    #[tokio::test]
    async fn unknown_session_id_is_rejected() {
        let tool = session_tool();
        let err = tool
            .invoke(serde_json::json!({
                "session_id": Uuid::new_v4().to_string(),
                "code": "1"
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn session_errors_render_a_traceback() {
        let tool = session_tool();
        let reply = tool
            .invoke(serde_json::json!({ "session_id": "new", "code": "nope + 1" }))
            .await
            .unwrap();
        assert!(reply.text.contains("Standard Error:"));
        assert!(reply.text.contains("NameError"));
    }
}

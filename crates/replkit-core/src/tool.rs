//! The capability interface exposed to callers.
//!
//! Every operation the server offers is a [`Tool`]: a named contract with a
//! JSON-schema parameter description and an async `invoke`. The transport
//! dispatches into a [`ToolSet`] and never knows concrete tool types.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::task::TaskId;

/// Tool definition advertised to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the tool arguments.
    pub parameters: Value,
}

/// Structured text reply from a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReply {
    /// Rendered response body.
    pub text: String,
}

impl ToolReply {
    /// Create a reply from rendered text.
    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }
}

/// Tool invocation error.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Trait for exposed operations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a [`ToolSet`].
    fn name(&self) -> &'static str;

    /// Tool description.
    fn description(&self) -> &'static str;

    /// JSON schema for the tool arguments.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn invoke(&self, args: Value) -> Result<ToolReply, ToolError>;

    /// The advertised definition.
    fn definition(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Named collection of tools.
#[derive(Default)]
pub struct ToolSet {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolSet {
    /// Create an empty tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any previous tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_none() {
            self.order.push(name);
        }
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions of all registered tools, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolInfo> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    /// Returns `UnknownTool` if no tool has that name, or the tool's own
    /// invocation error.
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<ToolReply, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tracing::debug!(tool = name, "dispatching tool invocation");
        tool.invoke(args).await
    }
}

//! The exposed tool surface.
//!
//! Five tools over the execution and session machinery:
//! - `shell` / `shell_status` - Command execution with background promotion
//! - `python` - One-shot sandboxed evaluation
//! - `python_session` - Persistent interpreter sessions
//! - `perl` - Pattern-based file rewriting

mod render;

pub mod perl;
pub mod python;
pub mod shell;

use std::sync::Arc;

use replkit_core::{ReplConfig, TaskRegistry, ToolSet};
use replkit_executor::{CommandExecutor, StatusPoller};
use replkit_session::SessionManager;

pub use perl::PerlTool;
pub use python::{PythonSessionTool, PythonTool};
pub use shell::{ShellStatusTool, ShellTool};

/// Build the full tool set over shared registries.
///
/// The session manager is taken by `Arc` so the caller can also own it
/// for sweeper control and shutdown.
#[must_use]
pub fn default_tool_set(config: &ReplConfig, sessions: Arc<SessionManager>) -> ToolSet {
    let registry = Arc::new(TaskRegistry::new());
    let executor = Arc::new(CommandExecutor::new(Arc::clone(&registry), config.clone()));
    let poller = Arc::new(StatusPoller::new(registry, config.clone()));

    ToolSet::new()
        .with(Arc::new(ShellTool::new(executor)))
        .with(Arc::new(ShellStatusTool::new(poller)))
        .with(Arc::new(PythonTool::new(config.python_bin.clone())))
        .with(Arc::new(PythonSessionTool::new(sessions)))
        .with(Arc::new(PerlTool::new()))
}

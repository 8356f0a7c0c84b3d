//! One-shot Python evaluation.
//!
//! Each call runs a fresh interpreter: the submitted code is written to a
//! temporary file and executed by an embedded wrapper program that captures
//! stdout/stderr, evaluates a trailing expression REPL-style, and prints a
//! single JSON result line. No state survives between calls and nothing is
//! ever registered as a task.

use std::io::Write;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::process::Command;

use crate::command::ExecError;
use crate::shell::which_async;

/// Wrapper program run as `python -c WRAPPER <code-file>`.
///
/// Reports errors as a full traceback on the captured stderr; a trailing
/// expression is echoed via `repr` unless it evaluates to `None`.
const ONESHOT_WRAPPER: &str = r#"
import ast, io, json, sys, traceback

with open(sys.argv[1], encoding="utf-8") as f:
    source = f.read()

out, err = io.StringIO(), io.StringIO()
real_out, real_err = sys.stdout, sys.stderr
sys.stdout, sys.stderr = out, err
ok, value = True, None
try:
    tree = ast.parse(source, "<python>")
    trailing = None
    if tree.body and isinstance(tree.body[-1], ast.Expr):
        trailing = tree.body.pop()
    scope = {"__name__": "__main__"}
    exec(compile(tree, "<python>", "exec"), scope)
    if trailing is not None:
        result = eval(compile(ast.Expression(trailing.value), "<python>", "eval"), scope)
        if result is not None:
            value = repr(result)
except BaseException:
    ok = False
    traceback.print_exc()
finally:
    sys.stdout, sys.stderr = real_out, real_err

json.dump({"ok": ok, "stdout": out.getvalue(), "stderr": err.getvalue(), "value": value}, sys.stdout)
sys.stdout.write("\n")
"#;

/// A one-shot evaluation request.
#[derive(Debug, Clone)]
pub struct PythonRequest {
    /// Python source to execute.
    pub code: String,
    /// Interpreter override; defaults to the configured binary.
    pub python_path: Option<String>,
}

impl PythonRequest {
    /// Create a request for the default interpreter.
    #[must_use]
    pub fn new<S: Into<String>>(code: S) -> Self {
        Self {
            code: code.into(),
            python_path: None,
        }
    }

    /// Select a specific interpreter.
    #[must_use]
    pub fn with_python_path<S: Into<String>>(mut self, path: S) -> Self {
        self.python_path = Some(path.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct WireReply {
    ok: bool,
    stdout: String,
    stderr: String,
    value: Option<String>,
}

/// Result of a one-shot evaluation.
#[derive(Debug, Clone)]
pub struct PythonOutput {
    /// Whether the code ran without raising.
    pub ok: bool,
    pub stdout: String,
    /// Captured stderr; carries the full traceback on failure.
    pub stderr: String,
    /// `repr` of a trailing expression, when present and not `None`.
    pub value: Option<String>,
    pub elapsed: Duration,
}

/// Run Python code in a fresh sandboxed interpreter.
///
/// # Errors
/// `Configuration` when the interpreter cannot be resolved, `Spawn`/`Io`
/// for process-level failures. Errors raised *inside* the code are data:
/// they come back as `ok: false` with the traceback in `stderr`.
pub async fn run_python(request: PythonRequest, default_bin: &str) -> Result<PythonOutput, ExecError> {
    let bin = request.python_path.as_deref().unwrap_or(default_bin);
    let python = which_async(bin)
        .await
        .ok_or_else(|| ExecError::Configuration(format!("python interpreter not found: {bin}")))?;

    let mut code_file = tempfile::Builder::new()
        .prefix("replkit-eval-")
        .suffix(".py")
        .tempfile()?;
    code_file.write_all(request.code.as_bytes())?;
    code_file.flush()?;

    let started = Instant::now();
    let output = Command::new(python)
        .arg("-c")
        .arg(ONESHOT_WRAPPER)
        .arg(code_file.path())
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(ExecError::Spawn)?;
    let elapsed = started.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let process_stderr = String::from_utf8_lossy(&output.stderr);

    // The wrapper's reply is the last line of stdout; anything else means
    // the interpreter itself fell over before reporting.
    let reply = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| serde_json::from_str::<WireReply>(line).ok());

    let Some(reply) = reply else {
        return Ok(PythonOutput {
            ok: false,
            stdout: String::new(),
            stderr: format!("python wrapper produced no result\n{process_stderr}"),
            value: None,
            elapsed,
        });
    };

    let mut stderr = reply.stderr;
    if !process_stderr.is_empty() {
        stderr.push_str(&process_stderr);
    }

    Ok(PythonOutput {
        ok: reply.ok,
        stdout: reply.stdout,
        stderr,
        value: reply.value,
        elapsed,
    })
}

//! The per-session interpreter child.
//!
//! Each session owns one Python child running the embedded driver program.
//! The driver holds the accumulated namespace and speaks line-delimited
//! JSON: one request line in, one reply line out. The namespace never
//! leaves the child; the Rust side only sees captured output.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
};

/// Driver program run as `python -u -c DRIVER`.
///
/// Per request: reset capture buffers, execute against the persistent
/// namespace, echo a trailing expression REPL-style, and reply with one
/// JSON line. Failures carry the full traceback so sessions stay
/// debuggable; the namespace survives failed executions.
const SESSION_DRIVER: &str = r#"
import ast, io, json, sys, traceback

ns = {"__name__": "__console__"}
for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    try:
        request = json.loads(line)
    except json.JSONDecodeError:
        continue
    code = request.get("code", "")
    out, err = io.StringIO(), io.StringIO()
    real_out, real_err = sys.stdout, sys.stderr
    sys.stdout, sys.stderr = out, err
    ok = True
    try:
        tree = ast.parse(code, "<session>")
        trailing = None
        if tree.body and isinstance(tree.body[-1], ast.Expr):
            trailing = tree.body.pop()
        if tree.body:
            exec(compile(tree, "<session>", "exec"), ns)
        if trailing is not None:
            result = eval(compile(ast.Expression(trailing.value), "<session>", "eval"), ns)
            if result is not None:
                print(repr(result))
    except BaseException:
        ok = False
        traceback.print_exc()
    finally:
        sys.stdout, sys.stderr = real_out, real_err
    reply = {"ok": ok, "stdout": out.getvalue(), "stderr": err.getvalue()}
    sys.stdout.write(json.dumps(reply) + "\n")
    sys.stdout.flush()
"#;

/// Interpreter error.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("python interpreter not found: {0}")]
    NotFound(String),
    #[error("failed to spawn interpreter: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("i/o error talking to interpreter: {0}")]
    Io(#[from] std::io::Error),
    #[error("interpreter protocol error: {0}")]
    Protocol(String),
}

#[derive(Serialize)]
struct EvalRequest<'a> {
    code: &'a str,
}

/// One reply from the driver.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalReply {
    /// Whether the code ran without raising.
    pub ok: bool,
    /// Captured stdout, including the echo of a trailing expression.
    pub stdout: String,
    /// Captured stderr; carries the full traceback on failure.
    pub stderr: String,
}

/// Handle to one driver child.
#[derive(Debug)]
pub struct PythonInterpreter {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl PythonInterpreter {
    /// Spawn a fresh interpreter child.
    ///
    /// The child is killed when this handle drops, so an evicted session
    /// can never leak its process.
    ///
    /// # Errors
    /// `NotFound` when the binary cannot be resolved, `Spawn` when the OS
    /// refuses the process.
    pub async fn spawn(python_bin: &str) -> Result<Self, InterpreterError> {
        let program = resolve(python_bin)
            .await
            .ok_or_else(|| InterpreterError::NotFound(python_bin.to_string()))?;

        let mut child = Command::new(program)
            .arg("-u")
            .arg("-c")
            .arg(SESSION_DRIVER)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(InterpreterError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InterpreterError::Protocol("missing child stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| InterpreterError::Protocol("missing child stdout".to_string()))?;

        tracing::debug!(pid = child.id(), "spawned session interpreter");

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Execute a code fragment against the persistent namespace.
    ///
    /// # Errors
    /// `Io` when the child's pipes fail, `Protocol` when the driver exits
    /// or replies with something unparseable. Errors raised by the code
    /// itself are data (`ok: false` with a traceback), not `Err`.
    pub async fn eval(&mut self, code: &str) -> Result<EvalReply, InterpreterError> {
        let request = serde_json::to_string(&EvalRequest { code })
            .map_err(|e| InterpreterError::Protocol(e.to_string()))?;

        self.stdin.write_all(request.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;

        let mut line = String::new();
        let n = self.stdout.read_line(&mut line).await?;
        if n == 0 {
            return Err(InterpreterError::Protocol(
                "interpreter closed the stream".to_string(),
            ));
        }

        serde_json::from_str(line.trim())
            .map_err(|e| InterpreterError::Protocol(format!("bad reply: {e}")))
    }

    /// Process id of the driver child, when still known.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

async fn resolve(executable: &str) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

//! The serve loop.
//!
//! Reads one request per line, spawns a task per request so a command
//! sitting in its sync-threshold window never blocks status checks or
//! session traffic, and writes replies through a shared writer.

use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
    sync::{Mutex, oneshot},
};

use replkit_core::ToolSet;

use crate::protocol::{ClientRequest, ServerReply};

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shared, line-oriented reply writer.
///
/// Cloneable across per-request tasks; each reply is serialized, written
/// and flushed under the writer lock so lines never interleave.
#[derive(Clone)]
pub struct ReplyWriter {
    writer: Arc<Mutex<BufWriter<Box<dyn AsyncWrite + Send + Unpin>>>>,
}

impl ReplyWriter {
    /// Wrap an async writer.
    #[must_use]
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(BufWriter::new(Box::new(writer)))),
        }
    }

    /// Write one reply line.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub async fn send(&self, reply: &ServerReply) -> Result<(), ProtocolError> {
        let json = serde_json::to_string(reply)?;
        let mut guard = self.writer.lock().await;
        guard.write_all(json.as_bytes()).await?;
        guard.write_all(b"\n").await?;
        guard.flush().await?;
        Ok(())
    }
}

/// Serve requests from `reader`, writing replies to `writer`, until EOF
/// or `shutdown` fires.
///
/// Malformed lines are answered with an `error` reply (id 0) and the loop
/// continues; in-flight invocations run on their own tasks and may still
/// complete after the loop returns.
///
/// # Errors
/// Returns error if the reader fails.
pub async fn serve<R>(
    reader: R,
    writer: ReplyWriter,
    tools: Arc<ToolSet>,
    shutdown: oneshot::Receiver<()>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = String::new();
    let mut shutdown = shutdown;

    loop {
        buffer.clear();
        tokio::select! {
            line_result = reader.read_line(&mut buffer) => {
                match line_result {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let line = buffer.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ClientRequest>(line) {
                            Ok(ClientRequest::Invoke { id, tool, args }) => {
                                // Invocations can block for seconds; give each
                                // its own task so the loop keeps reading.
                                let tools = Arc::clone(&tools);
                                let writer = writer.clone();
                                tokio::spawn(async move {
                                    let reply = invoke(&tools, id, tool, args).await;
                                    if let Err(e) = writer.send(&reply).await {
                                        tracing::error!("Failed to send reply: {e}");
                                    }
                                });
                            }
                            Ok(ClientRequest::ListTools { id }) => {
                                let reply = ServerReply::Tools {
                                    id,
                                    tools: tools.definitions(),
                                };
                                if let Err(e) = writer.send(&reply).await {
                                    tracing::error!("Failed to send tools reply: {e}");
                                }
                            }
                            Ok(ClientRequest::Ping) => {
                                if let Err(e) = writer.send(&ServerReply::Pong).await {
                                    tracing::error!("Failed to send pong: {e}");
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Invalid client request: {e}");
                                let reply = ServerReply::Error {
                                    id: 0,
                                    message: format!("invalid request: {e}"),
                                };
                                if let Err(e) = writer.send(&reply).await {
                                    tracing::error!("Failed to send error reply: {e}");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading request stream: {e}");
                        return Err(e.into());
                    }
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, stopping serve loop");
                break;
            }
        }
    }

    Ok(())
}

/// Serve over the process's stdin/stdout.
///
/// # Errors
/// Returns error if stdin fails.
pub async fn serve_stdio(
    tools: Arc<ToolSet>,
    shutdown: oneshot::Receiver<()>,
) -> Result<(), ProtocolError> {
    serve(
        tokio::io::stdin(),
        ReplyWriter::new(tokio::io::stdout()),
        tools,
        shutdown,
    )
    .await
}

async fn invoke(tools: &ToolSet, id: u64, tool: String, args: serde_json::Value) -> ServerReply {
    match tools.dispatch(&tool, args).await {
        Ok(reply) => ServerReply::Result {
            id,
            content: reply.text,
        },
        Err(err) => ServerReply::Error {
            id,
            message: err.to_string(),
        },
    }
}

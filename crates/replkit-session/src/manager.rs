//! Session orchestration and the idle sweep.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, RwLock, Weak},
    time::{Duration, Instant},
};

use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;

use replkit_core::ReplConfig;

use crate::interpreter::{InterpreterError, PythonInterpreter};

/// Session identifier.
pub type SessionId = Uuid;

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown id: never issued, explicitly closed, or reclaimed by the
    /// sweep. Ids are server-generated, so this is never a creation path.
    #[error("session not found: {0}")]
    NotFound(SessionId),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}

/// Result of one session execution.
#[derive(Debug, Clone)]
pub struct SessionExecution {
    pub session_id: SessionId,
    /// Whether the code ran without raising.
    pub ok: bool,
    pub stdout: String,
    /// Captured stderr; carries the full traceback on failure.
    pub stderr: String,
    pub elapsed: Duration,
}

/// One live session: the interpreter handle plus bookkeeping.
///
/// The interpreter mutex serializes executions in arrival order; the
/// bookkeeping fields are read by the sweep without taking it.
struct SessionEntry {
    id: SessionId,
    interpreter: Mutex<PythonInterpreter>,
    last_active: StdMutex<Instant>,
    last_output: StdMutex<(String, String)>,
}

/// Manages interpreter sessions and reclaims idle ones.
///
/// Sessions are fully independent: each has its own child process and its
/// own lock, so a long execution in one never delays another.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
    config: ReplConfig,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager; call [`spawn_sweeper`](Self::spawn_sweeper) to
    /// start idle reclamation.
    #[must_use]
    pub fn new(config: ReplConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            sweeper: StdMutex::new(None),
        }
    }

    /// Create a new session with a fresh interpreter child.
    ///
    /// # Errors
    /// Returns the interpreter spawn failure.
    pub async fn create_session(&self) -> Result<SessionId, SessionError> {
        let interpreter = PythonInterpreter::spawn(&self.config.python_bin).await?;
        let id = Uuid::new_v4();

        let entry = Arc::new(SessionEntry {
            id,
            interpreter: Mutex::new(interpreter),
            last_active: StdMutex::new(Instant::now()),
            last_output: StdMutex::new((String::new(), String::new())),
        });
        self.sessions.write().unwrap().insert(id, entry);

        tracing::info!(%id, "created session");
        Ok(id)
    }

    /// Execute code against a session's accumulated state.
    ///
    /// Concurrent calls against the same id run one at a time in arrival
    /// order; calls against distinct ids proceed independently. A code
    /// error is a normal result (`ok: false`, traceback in `stderr`) and
    /// leaves the session usable.
    ///
    /// # Errors
    /// `NotFound` for unknown ids; `Interpreter` when the driver child
    /// itself fails, in which case the session is discarded.
    pub async fn execute(&self, id: SessionId, code: &str) -> Result<SessionExecution, SessionError> {
        let entry = self
            .sessions
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))?;

        let mut interpreter = entry.interpreter.lock().await;
        *entry.last_active.lock().unwrap() = Instant::now();
        tracing::debug!(id = %entry.id, "executing session code");

        let started = Instant::now();
        let reply = match interpreter.eval(code).await {
            Ok(reply) => reply,
            Err(err) => {
                // The child is gone or the stream is corrupt; the session
                // cannot be trusted any more.
                drop(interpreter);
                self.sessions.write().unwrap().remove(&id);
                tracing::warn!(%id, %err, "session interpreter failed, discarding session");
                return Err(err.into());
            }
        };
        let elapsed = started.elapsed();

        *entry.last_active.lock().unwrap() = Instant::now();
        *entry.last_output.lock().unwrap() = (reply.stdout.clone(), reply.stderr.clone());

        Ok(SessionExecution {
            session_id: id,
            ok: reply.ok,
            stdout: reply.stdout,
            stderr: reply.stderr,
            elapsed,
        })
    }

    /// Captured output of a session's most recent execution.
    #[must_use]
    pub fn last_output(&self, id: SessionId) -> Option<(String, String)> {
        let entry = self.sessions.read().unwrap().get(&id).cloned()?;
        let output = entry.last_output.lock().unwrap().clone();
        Some(output)
    }

    /// Explicitly destroy a session, killing its interpreter child.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn close_session(&self, id: SessionId) -> Result<(), SessionError> {
        self.sessions
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| tracing::info!(%id, "closed session"))
            .ok_or(SessionError::NotFound(id))
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Evict every session idle past the timeout, skipping any with an
    /// execution in flight. Returns the number evicted.
    pub fn sweep_idle(&self) -> usize {
        let idle_timeout = self.config.session_idle_timeout;
        let mut evicted = 0;

        self.sessions.write().unwrap().retain(|id, entry| {
            // A held lock means an execution is in flight (or queued);
            // never evict those, whatever the idle clock says.
            let Ok(_guard) = entry.interpreter.try_lock() else {
                return true;
            };
            let idle = entry.last_active.lock().unwrap().elapsed();
            if idle > idle_timeout {
                tracing::info!(%id, ?idle, "evicting idle session");
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Start the periodic idle sweep.
    ///
    /// The sweep holds only a weak reference, so dropping the manager
    /// ends it; [`shutdown`](Self::shutdown) ends it immediately.
    pub fn spawn_sweeper(self: Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(&self);
        let sweep_interval = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a fresh server
            // does not sweep before anything can be idle.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                let evicted = manager.sweep_idle();
                if evicted > 0 {
                    tracing::debug!(evicted, "session sweep finished");
                }
            }
        });

        if let Some(previous) = self.sweeper.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the sweep and destroy every session.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
        self.sessions.write().unwrap().clear();
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }
}

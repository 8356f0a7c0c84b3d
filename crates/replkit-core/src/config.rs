//! Server configuration.

use std::time::Duration;

/// Elapsed-time cutoff between a synchronous reply and background promotion.
///
/// Kept just under five seconds so the synchronous reply path has margin
/// before a caller-side five-second expectation.
pub const DEFAULT_SYNC_THRESHOLD: Duration = Duration::from_millis(4_900);

/// How often the status poller re-reads a running task.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Total time the status poller waits before reporting "still running".
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_secs(5);

/// Idle time after which a session becomes eligible for eviction.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How often the background sweep scans for idle sessions.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(45);

/// Configuration for executors, pollers and the session manager.
///
/// The defaults match the documented tool contract; tests shrink the
/// durations to keep suites fast.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Commands finishing within this window reply synchronously.
    pub sync_threshold: Duration,
    /// Sleep between status re-reads while a task is running.
    pub poll_interval: Duration,
    /// Maximum time a single status check blocks.
    pub poll_budget: Duration,
    /// Idle time before a session is reclaimed.
    pub session_idle_timeout: Duration,
    /// Interval of the idle-session sweep.
    pub sweep_interval: Duration,
    /// Python interpreter used for sessions and one-shot evaluation.
    pub python_bin: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            sync_threshold: DEFAULT_SYNC_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_budget: DEFAULT_POLL_BUDGET,
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            python_bin: "python3".to_string(),
        }
    }
}

impl ReplConfig {
    /// Create a configuration with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the sync/async threshold.
    #[must_use]
    pub fn with_sync_threshold(mut self, threshold: Duration) -> Self {
        self.sync_threshold = threshold;
        self
    }

    /// Override the status poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the status poll budget.
    #[must_use]
    pub fn with_poll_budget(mut self, budget: Duration) -> Self {
        self.poll_budget = budget;
        self
    }

    /// Override the session idle timeout.
    #[must_use]
    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    /// Override the sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Override the Python interpreter.
    #[must_use]
    pub fn with_python_bin<S: Into<String>>(mut self, python_bin: S) -> Self {
        self.python_bin = python_bin.into();
        self
    }
}

//! Runnable replkit tool server over stdin/stdout.
//!
//! Run with: cargo run -p stdio-server-demo
//!
//! Speaks one JSON document per line, e.g.:
//! {"type":"invoke","id":1,"tool":"shell","args":{"command":"echo hi"}}
//! {"type":"list_tools","id":2}

use std::{sync::Arc, time::Duration};

use replkit_core::ReplConfig;
use replkit_session::SessionManager;
use replkit_tools::default_tool_set;
use replkit_transport::serve_stdio;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is the wire.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_env("REPLKIT_LOG")
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = config_from_env();
    tracing::info!(
        sync_threshold_ms = config.sync_threshold.as_millis() as u64,
        session_idle_timeout_s = config.session_idle_timeout.as_secs(),
        python_bin = %config.python_bin,
        "starting replkit stdio server"
    );

    let sessions = Arc::new(SessionManager::new(config.clone()));
    Arc::clone(&sessions).spawn_sweeper();

    let tools = Arc::new(default_tool_set(&config, Arc::clone(&sessions)));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    serve_stdio(tools, shutdown_rx).await?;

    sessions.shutdown();
    tracing::info!("server stopped");
    Ok(())
}

fn config_from_env() -> ReplConfig {
    let mut config = ReplConfig::new();
    if let Ok(python_bin) = std::env::var("REPLKIT_PYTHON") {
        config = config.with_python_bin(python_bin);
    }
    if let Some(threshold) = env_millis("REPLKIT_SYNC_THRESHOLD_MS") {
        config = config.with_sync_threshold(threshold);
    }
    if let Some(timeout) = env_millis("REPLKIT_SESSION_IDLE_TIMEOUT_MS") {
        config = config.with_session_idle_timeout(timeout);
    }
    config
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_millis)
}

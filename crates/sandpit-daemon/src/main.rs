//! sandpit-daemon - Persistent sandbox daemon
//!
//! Serves `execute`, `screen`, `status` and `ping` over a Unix socket using
//! length-prefixed msgpack frames. Concurrency is bounded by the executor's
//! admission gate.

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use sandpit_core::Executor;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing_subscriber::EnvFilter;

mod config;
mod server;

use config::DaemonConfig;

#[derive(Parser)]
#[command(name = "sandpit-daemon")]
#[command(author, version, about = "Sandbox daemon for untrusted code snippets")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SANDPIT_CONFIG")]
    config: Option<PathBuf>,

    /// Socket path (overrides the config file)
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sandpit_core=info".parse()?)
                .add_directive("sandpit_daemon=info".parse()?),
        )
        .init();

    tracing::info!("sandpit-daemon starting");

    let args = Args::parse();
    let mut config = DaemonConfig::load(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    tracing::info!(
        max_concurrent = config.sandbox.max_concurrent,
        timeout = ?config.sandbox.timeout,
        interpreter = ?config.sandbox.interpreter,
        socket = ?config.socket_path,
        "configuration loaded"
    );

    // Create socket directory if needed
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Remove existing socket
    let _ = std::fs::remove_file(&config.socket_path);

    let listener = UnixListener::bind(&config.socket_path)?;
    tracing::info!(socket = ?config.socket_path, "listening");

    let executor = Arc::new(Executor::new(config.sandbox.clone())?);

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();

    tokio::select! {
        res = server::run(listener, Arc::clone(&executor)) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "accept loop failed");
            }
        }
        Some(signal) = signals.next() => {
            tracing::info!(signal, "shutting down");
        }
    }

    signals_handle.close();
    executor.shutdown();
    let _ = std::fs::remove_file(&config.socket_path);

    tracing::info!("sandpit-daemon stopped");
    Ok(())
}

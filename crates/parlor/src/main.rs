//! # parlor
//!
//! Parlor chat relay binary: parses flags, loads configuration, starts the
//! WebSocket server and runs until Ctrl-C or `exit` on stdin.

#![deny(unsafe_code)]

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::Serialized;
use parlor_core::logging;
use parlor_server::{RelayServer, ServerConfig};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Parlor chat relay server.
#[derive(Parser, Debug, Serialize)]
#[command(name = "parlor", version, about = "Parlor chat relay server")]
struct Cli {
    /// Host to bind (overrides config file and environment).
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides config file and environment).
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,

    /// Path to a JSON config file.
    #[arg(long, short)]
    #[serde(skip)]
    config: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, default_value = logging::DEFAULT_LEVEL)]
    #[serde(skip)]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    #[serde(skip)]
    json_logs: bool,
}

/// Defaults, config file, `PARLOR_*` environment, then CLI flags.
fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let figment = ServerConfig::figment(cli.config.as_deref())?.merge(Serialized::defaults(cli));
    Ok(ServerConfig::from_figment(&figment)?)
}

/// Block until a line reading `exit`. Returns `false` on EOF or read error.
fn wait_for_exit_command(reader: impl BufRead) -> bool {
    for line in reader.lines() {
        match line {
            Ok(line) if line.trim() == "exit" => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

/// Watch stdin on a dedicated thread; a blocking read must not hold up
/// runtime shutdown.
fn spawn_console_listener() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("parlor-console".into())
        .spawn(move || {
            if wait_for_exit_command(std::io::stdin().lock()) {
                let _ = tx.send(());
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to start console listener");
    }
    rx
}

async fn wait_for_stop(console: oneshot::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };
    let console = async {
        if console.await.is_err() {
            // stdin closed without `exit`; keep serving
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = console => info!("received exit command"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        logging::init_json_subscriber(&cli.log_level);
    } else {
        logging::init_subscriber(&cli.log_level);
    }

    let config = load_config(&cli).context("failed to load configuration")?;
    let shutdown_timeout = config.shutdown_timeout();
    let server = RelayServer::new(config);

    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind {}", server.config().bind_addr()))?;
    info!(%addr, "parlor relay ready, type `exit` or press Ctrl-C to stop");

    wait_for_stop(spawn_console_listener()).await;

    info!(
        connections = server.relay().registry().len(),
        "shutting down"
    );
    let drained = server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(shutdown_timeout))
        .await;
    if !drained {
        warn!("exiting with sessions still open");
    }
    Ok(())
}

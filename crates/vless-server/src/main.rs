//! vless-server: WebSocket tunnel relay.
//!
//! Serves a landing page and a subscription link over plain HTTP, and turns
//! every WebSocket upgrade into a tunnel session that relays to the TCP
//! destination named in its first message.

mod config;
mod http;
mod limits;
mod server;
mod transport;
mod tunnel;

use clap::Parser;
use config::{Overrides, ServerConfig};
use server::RelayServer;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// vless-server: WebSocket tunnel relay
#[derive(Parser, Debug)]
#[command(name = "vless-server", version, about = "WebSocket tunnel relay")]
struct Cli {
    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Listen address
    #[arg(long)]
    bind: Option<String>,

    /// Identifier clients must present (UUID)
    #[arg(long, env = "UUID")]
    uuid: Option<String>,

    /// Landing page served at `/`
    #[arg(long)]
    index: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.vless-relay/config.toml")]
    config: String,

    /// Maximum concurrent tunnel sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Outbound connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Seconds to wait for the request header after the upgrade
    #[arg(long)]
    handshake_timeout: Option<u64>,

    /// Relay idle timeout in seconds (0 disables)
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting vless-server");

    let config_path = PathBuf::from(&cli.config);
    let overrides = Overrides {
        port: cli.port,
        bind: cli.bind,
        uuid: cli.uuid,
        index: cli.index,
        max_sessions: cli.max_sessions,
        connect_timeout: cli.connect_timeout,
        handshake_timeout: cli.handshake_timeout,
        idle_timeout: cli.idle_timeout,
    };
    let server_config = match ServerConfig::load(Some(&config_path), overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };
    info!(
        port = server_config.port,
        max_sessions = server_config.max_sessions,
        connect_timeout = ?server_config.connect_timeout,
        handshake_timeout = ?server_config.handshake_timeout,
        idle_timeout = ?server_config.idle_timeout,
        "config loaded"
    );

    let relay_server = RelayServer::new(server_config);

    tokio::select! {
        result = relay_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("vless-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C only");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}

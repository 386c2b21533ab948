use std::path::Path;
use std::sync::Arc;

use horizon_support::{Database, SupportDesk};
use support_server::{handle_connection, spawn_event_relay, ServerConfig, ServerState};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "horizon-support.log";

/// Console logging always; daily rolling files too when a log dir is configured.
/// The returned guard must live as long as the process to flush file output.
fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let _log_guard = init_logging(config.log_dir.as_deref());

    let db = match Database::open(&config.db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database {}: {}", config.db_path.display(), e);
            std::process::exit(1);
        }
    };
    info!("Database ready at {}", config.db_path.display());

    let desk = SupportDesk::new(db, config.support.clone());
    if let Err(e) = desk.resume_pending_deletions().await {
        warn!("Could not resume pending deletions: {}", e);
    }

    if config.admin_token.is_none() {
        warn!("HORIZON_ADMIN_TOKEN is not set; no client can connect as an admin");
    }

    // Create server state
    let state = Arc::new(ServerState::new(desk, config.admin_token.clone()));
    let relay = spawn_event_relay(state.clone());

    // Bind TCP listener
    let listener = match TcpListener::bind(&config.addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.addr, e);
            std::process::exit(1);
        }
    };

    info!("Support server listening on {}", config.addr);

    // Accept connections until interrupted
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    info!("New connection from {}", peer_addr);

                    let state = state.clone();
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws_stream) => {
                                handle_connection(ws_stream, state).await;
                            }
                            Err(e) => {
                                error!("WebSocket handshake failed for {}: {}", peer_addr, e);
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    // Resolved chats stay resolved and are picked up again on the next start
    state.desk.scheduler().shutdown();
    relay.abort();
}

// src/server/initialization.rs

//! Handles the complete server initialization process, from loading the account
//! directory to binding the listening socket.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::accounts::{AccountRegistry, load_from_file};
use crate::core::activity::{ActivityLog, FileActivityLog, NullActivityLog};
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::info;

/// Initializes all server components from configuration before starting the main loop.
///
/// Every failure here is fatal: the process cannot start without its account directory
/// or its listening socket.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let registry = Arc::new(load_registry(&config)?);

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut background_tasks = JoinSet::new();

    let activity: ActivityLog = match &config.activity_log {
        Some(path) => {
            let (sink, writer) = FileActivityLog::open(path)
                .await
                .with_context(|| format!("Failed to open activity log '{path}'"))?;
            let shutdown_rx = shutdown_tx.subscribe();
            background_tasks.spawn(writer.run(shutdown_rx));
            Arc::new(sink)
        }
        None => {
            info!("Activity log is disabled in the configuration.");
            Arc::new(NullActivityLog)
        }
    };

    bind(config, registry, activity, shutdown_tx, background_tasks).await
}

/// Binds a server around an already-built registry and activity sink.
pub async fn setup_with(
    config: Config,
    registry: Arc<AccountRegistry>,
    activity: ActivityLog,
) -> Result<ServerContext> {
    let (shutdown_tx, _) = broadcast::channel(1);
    bind(config, registry, activity, shutdown_tx, JoinSet::new()).await
}

async fn bind(
    config: Config,
    registry: Arc<AccountRegistry>,
    activity: ActivityLog,
    shutdown_tx: broadcast::Sender<()>,
    background_tasks: JoinSet<()>,
) -> Result<ServerContext> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!(
        "sessiond listening on {} ({} dispatch)",
        listener.local_addr()?,
        config.dispatch
    );

    let shutdown_rx = shutdown_tx.subscribe();
    let connection_permits = Arc::new(Semaphore::new(config.max_clients));
    let state = ServerState::new(config, registry, activity);

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        shutdown_rx,
        background_tasks,
        connection_permits,
    })
}

/// Loads the account directory named by the configuration.
fn load_registry(config: &Config) -> Result<AccountRegistry> {
    let accounts = load_from_file(&config.accounts_file)
        .with_context(|| format!("Failed to load accounts from '{}'", config.accounts_file))?;
    let registry = AccountRegistry::from_accounts(accounts);
    info!(
        "Loaded {} accounts from {}",
        registry.len(),
        config.accounts_file
    );
    Ok(registry)
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Server configured with max_clients = {}, max_line_length = {} bytes.",
        config.max_clients, config.max_line_length
    );
}

// src/server/mod.rs

use crate::config::{Config, DispatchStrategy};
use anyhow::Result;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{info, warn};

mod connection_loop;
mod context;
mod initialization;
mod poller;

pub use context::ServerContext;
pub use initialization::{setup, setup_with};

/// The main server startup function: initialize, then dispatch until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let server_context = setup(config).await?;
    spawn_signal_listener(server_context.shutdown_handle());
    serve(server_context).await;
    Ok(())
}

/// Runs the configured dispatcher on an initialized context until shutdown is signalled,
/// then waits for background tasks to finish.
pub async fn serve(mut ctx: ServerContext) {
    match ctx.state.config.dispatch {
        DispatchStrategy::Poll => poller::run(&mut ctx).await,
        DispatchStrategy::Worker => connection_loop::run(&mut ctx).await,
    }

    // Background tasks subscribed to the same channel; make sure they have heard it.
    let _ = ctx.shutdown_tx.send(());

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    }
    info!("Server shutdown complete.");
}

/// Forwards SIGINT and SIGTERM into the shutdown channel.
fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Failed to register signal handlers: {}. Graceful shutdown on signal is unavailable.", e);
                    return;
                }
            };
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
        let _ = shutdown_tx.send(());
    });
}

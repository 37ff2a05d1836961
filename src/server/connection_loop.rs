// src/server/connection_loop.rs

//! The worker-per-connection dispatcher: the accept loop spawns one task per admitted
//! connection, and each task owns exactly one session until disconnect.

use super::context::ServerContext;
use crate::connection::{ConnectionGuard, ConnectionHandler};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long live workers get to wind down after shutdown before they are aborted.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The main server loop that accepts connections until shutdown is signalled.
pub async fn run(ctx: &mut ServerContext) {
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = ctx.shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping accept loop.");
                break;
            }

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        ctx.state.stats.increment_total_connections();
                        let session_id = ctx.state.next_session_id();
                        let guard = match ConnectionGuard::admit(
                            ctx.state.clone(),
                            &ctx.connection_permits,
                            session_id,
                            addr,
                        ) {
                            Ok(guard) => guard,
                            Err(e) => {
                                // Dropping the socket closes it without a reply.
                                warn!("Refusing connection from {}: {}", addr, e);
                                continue;
                            }
                        };
                        info!("Accepted new connection from: {}", addr);

                        let state = ctx.state.clone();
                        let conn_shutdown_rx = ctx.shutdown_tx.subscribe();
                        client_tasks.spawn(async move {
                            let mut handler =
                                ConnectionHandler::new(socket, state, guard, conn_shutdown_rx);
                            if let Err(e) = handler.run().await {
                                if e.is_normal_disconnect() {
                                    debug!("Connection from {} closed by peer: {}", addr, e);
                                } else {
                                    warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                                }
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            }

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            }
        }
    }

    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for connection workers; aborting the rest.");
    }
    client_tasks.shutdown().await;
    info!("All client connections closed.");
}

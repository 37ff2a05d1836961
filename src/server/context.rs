// src/server/context.rs

use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    /// Subscribed at bind time so a shutdown sent before the dispatcher starts is not lost.
    pub shutdown_rx: broadcast::Receiver<()>,
    pub background_tasks: JoinSet<()>,
    /// One permit per admissible connection, sized by `max_clients`.
    pub connection_permits: Arc<Semaphore>,
}

impl ServerContext {
    /// The address the listener is actually bound to (useful when the port was 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle that stops both dispatchers when sent on.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

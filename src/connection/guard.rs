// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use crate::core::SessionServerError;
use crate::core::state::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Holds one of the server's connection slots for as long as the connection lives.
///
/// Both dispatchers create exactly one guard per admitted connection and drop it on
/// teardown, whichever path caused the teardown.
pub struct ConnectionGuard {
    /// A shared reference to the server state.
    state: Arc<ServerState>,
    /// The unique identifier for the client session.
    session_id: u64,
    /// The network address of the client.
    addr: SocketAddr,
    _permit: OwnedSemaphorePermit,
}

impl ConnectionGuard {
    /// Claims a connection slot, or fails if `max_clients` connections are already live.
    pub fn admit(
        state: Arc<ServerState>,
        permits: &Arc<Semaphore>,
        session_id: u64,
        addr: SocketAddr,
    ) -> Result<Self, SessionServerError> {
        let permit = permits.clone().try_acquire_owned().map_err(|_| {
            state.stats.increment_refused_connections();
            SessionServerError::ConnectionLimit(state.config.max_clients)
        })?;
        state.stats.client_connected();
        Ok(Self {
            state,
            session_id,
            addr,
            _permit: permit,
        })
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for ConnectionGuard {
    /// Returns the slot and updates the live-client count.
    fn drop(&mut self) {
        self.state.stats.client_disconnected();
        debug!(
            "ConnectionGuard dropping, releasing slot for session {} ({})",
            self.session_id, self.addr
        );
    }
}

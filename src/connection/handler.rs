// src/connection/handler.rs

//! Defines the `ConnectionHandler` which owns one connection under the worker strategy.

use super::guard::ConnectionGuard;
use super::session::Session;
use crate::core::SessionServerError;
use crate::core::protocol::{LineCodec, ReplyCode, has_complete_line};
use crate::core::state::ServerState;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Manages the full lifecycle of a client connection.
///
/// The handler owns its socket, its receive buffer (inside `Framed`), and its session.
/// Nothing here is shared with other workers except the account registry.
pub struct ConnectionHandler {
    framed: Framed<TcpStream, LineCodec>,
    addr: SocketAddr,
    state: Arc<ServerState>,
    session: Session,
    shutdown_rx: broadcast::Receiver<()>,
    // Declared last so the slot is returned after the session has released its account.
    guard: ConnectionGuard,
}

impl ConnectionHandler {
    /// Creates a new `ConnectionHandler`.
    pub fn new(
        socket: TcpStream,
        state: Arc<ServerState>,
        guard: ConnectionGuard,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let addr = guard.addr();
        let session = Session::new(
            guard.session_id(),
            addr,
            state.registry.clone(),
            state.activity.clone(),
        );
        Self {
            framed: Framed::new(socket, LineCodec::new(state.config.max_line_length)),
            addr,
            state,
            session,
            shutdown_rx,
            guard,
        }
    }

    /// The main loop for the connection: greet, then read frames until disconnect.
    pub async fn run(&mut self) -> Result<(), SessionServerError> {
        let greeting = self.session.greet();
        self.framed.send(greeting).await?;

        let result = loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Connection handler for {} received shutdown signal.", self.addr);
                    break Ok(());
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(line)) => {
                            let reply = self.session.handle_line(&line);
                            self.state.stats.increment_total_commands();
                            if let Err(e) = self.queue_reply(reply).await {
                                break Err(e);
                            }
                        }
                        Some(Err(e @ SessionServerError::LineTooLong { .. })) => {
                            warn!("Rejecting connection from {}: {}", self.addr, e);
                            // Replies to lines that preceded the oversized one still go out.
                            if let Err(flush_err) = self.framed.flush().await {
                                debug!("Failed to flush replies to {}: {}", self.addr, flush_err);
                            }
                            break Ok(());
                        }
                        Some(Err(e)) => break Err(e),
                        None => {
                            debug!("Connection from {} closed by peer.", self.addr);
                            break Ok(());
                        }
                    }
                }
            }
        };

        self.session.release();
        debug!(
            "Session {} for {} finished.",
            self.guard.session_id(),
            self.addr
        );
        result
    }

    /// Buffers a reply, flushing once no further complete line is already waiting, so
    /// replies to pipelined commands are coalesced and always leave in request order.
    async fn queue_reply(&mut self, reply: ReplyCode) -> Result<(), SessionServerError> {
        self.framed.feed(reply).await?;
        if !has_complete_line(self.framed.read_buffer()) {
            self.framed.flush().await?;
        }
        Ok(())
    }
}

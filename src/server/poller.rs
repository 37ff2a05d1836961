// src/server/poller.rs

//! The readiness-polling dispatcher: a single control loop owns every connection.
//!
//! Each iteration waits until the listener or at least one connection is ready, then
//! services the listener first and every ready connection in ascending handle order,
//! reading at most one chunk per connection before waiting again. Sockets are only
//! touched with non-blocking `try_read` and `try_write`, so the readiness wait is the
//! only suspension point. Replies a client has not yet taken stay in that connection's
//! outbound buffer, and a connection whose backlog passes [`MAX_PENDING_OUTPUT`] is not
//! read from again until it drains.

use super::context::ServerContext;
use crate::connection::{ConnectionGuard, Session};
use crate::core::SessionServerError;
use crate::core::protocol::{LineCodec, ReplyCode, feed};
use crate::core::state::ServerState;
use bytes::{Buf, BytesMut};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, warn};

/// The most bytes taken from one connection per iteration.
const READ_CHUNK_SIZE: usize = 4096;

/// Unsent reply bytes above which a connection stops being read.
pub const MAX_PENDING_OUTPUT: usize = 64 * 1024;

/// What woke the control loop.
enum Wake {
    Shutdown,
    Accept(std::io::Result<(TcpStream, SocketAddr)>),
    Ready,
}

/// What became of a connection after it was serviced.
enum Serviced {
    Open,
    Closed,
}

/// A connection owned by the control loop, with its own buffers and session.
struct PolledConnection {
    stream: TcpStream,
    addr: SocketAddr,
    buffer: BytesMut,
    /// Encoded replies the socket has not accepted yet.
    outbound: BytesMut,
    codec: LineCodec,
    session: Session,
    // Declared last so the slot is returned after the session has released its account.
    _guard: ConnectionGuard,
}

impl PolledConnection {
    fn backlogged(&self) -> bool {
        self.outbound.len() >= MAX_PENDING_OUTPUT
    }

    /// The readiness this connection is waiting for. Never empty: a backlogged
    /// connection always has output pending.
    fn interest(&self) -> Interest {
        match (self.backlogged(), self.outbound.is_empty()) {
            (true, _) => Interest::WRITABLE,
            (false, true) => Interest::READABLE,
            (false, false) => Interest::READABLE | Interest::WRITABLE,
        }
    }

    /// Writes as much pending output as the socket takes without blocking.
    fn flush_outbound(&mut self) -> Result<(), SessionServerError> {
        while !self.outbound.is_empty() {
            match self.stream.try_write(&self.outbound) {
                Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
                Ok(n) => self.outbound.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn queue(&mut self, reply: ReplyCode) -> Result<(), SessionServerError> {
        self.codec.encode(reply, &mut self.outbound)
    }

    /// Flushes pending output, then reads the next available chunk and answers every
    /// complete line in it.
    fn service(&mut self, state: &ServerState) -> Serviced {
        if let Err(e) = self.flush_outbound() {
            self.log_transport_error(&e);
            return Serviced::Closed;
        }
        if self.backlogged() {
            return Serviced::Open;
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match self.stream.try_read(&mut chunk) {
            Ok(0) => {
                debug!("Connection from {} closed by peer.", self.addr);
                // Best effort: the peer may only have shut down its sending half.
                let _ = self.flush_outbound();
                return Serviced::Closed;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Serviced::Open,
            Err(e) => {
                self.log_transport_error(&SessionServerError::from(e));
                return Serviced::Closed;
            }
        };
        feed(&mut self.buffer, &chunk[..read]);

        let outcome = loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(line)) => {
                    let reply = self.session.handle_line(&line);
                    state.stats.increment_total_commands();
                    if let Err(e) = self.queue(reply) {
                        error!("Failed to encode reply for {}: {}", self.addr, e);
                        break Serviced::Closed;
                    }
                }
                Ok(None) => break Serviced::Open,
                Err(e) => {
                    warn!("Rejecting connection from {}: {}", self.addr, e);
                    break Serviced::Closed;
                }
            }
        };

        if let Err(e) = self.flush_outbound() {
            self.log_transport_error(&e);
            return Serviced::Closed;
        }
        outcome
    }

    fn log_transport_error(&self, e: &SessionServerError) {
        if e.is_normal_disconnect() {
            debug!("Connection from {} closed by peer: {}", self.addr, e);
        } else {
            warn!("Connection error for {}: {}", self.addr, e);
        }
    }
}

/// The dispatcher's own state: the listener lives in the context, connections live here.
struct Poller {
    state: Arc<ServerState>,
    connections: BTreeMap<u64, PolledConnection>,
}

impl Poller {
    /// Admits an accepted socket, greets it, and adds it to the polled set.
    fn admit(&mut self, ctx: &ServerContext, socket: TcpStream, addr: SocketAddr) {
        self.state.stats.increment_total_connections();
        let session_id = self.state.next_session_id();
        let guard = match ConnectionGuard::admit(
            self.state.clone(),
            &ctx.connection_permits,
            session_id,
            addr,
        ) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Refusing connection from {}: {}", addr, e);
                return;
            }
        };
        info!("Accepted new connection from: {}", addr);

        let session = Session::new(
            session_id,
            addr,
            self.state.registry.clone(),
            self.state.activity.clone(),
        );
        let mut conn = PolledConnection {
            stream: socket,
            addr,
            buffer: BytesMut::new(),
            outbound: BytesMut::new(),
            codec: LineCodec::new(self.state.config.max_line_length),
            session,
            _guard: guard,
        };

        let greeting = conn.session.greet();
        if let Err(e) = conn.queue(greeting).and_then(|()| conn.flush_outbound()) {
            warn!("Failed to greet {}: {}", addr, e);
            return;
        }
        self.connections.insert(session_id, conn);
    }

    /// Services every connection in ascending handle order. Connections that are not
    /// ready see `WouldBlock` and are left as they are.
    fn drain_ready(&mut self) {
        let ids: Vec<u64> = self.connections.keys().copied().collect();
        for id in ids {
            let Some(conn) = self.connections.get_mut(&id) else {
                continue;
            };
            if let Serviced::Closed = conn.service(&self.state) {
                // Dropping the connection releases its account and its slot.
                self.connections.remove(&id);
            }
        }
    }
}

/// Resolves once at least one connection is ready for what it is waiting on. Never
/// resolves for an empty set.
async fn wait_ready(connections: &BTreeMap<u64, PolledConnection>) {
    if connections.is_empty() {
        return std::future::pending().await;
    }
    let readiness = connections
        .values()
        .map(|conn| Box::pin(conn.stream.ready(conn.interest())));
    let _ = futures::future::select_all(readiness).await;
}

/// Runs the readiness-polling dispatcher until shutdown is signalled.
pub async fn run(ctx: &mut ServerContext) {
    let mut poller = Poller {
        state: ctx.state.clone(),
        connections: BTreeMap::new(),
    };

    loop {
        let wake = tokio::select! {
            biased;
            _ = ctx.shutdown_rx.recv() => Wake::Shutdown,
            res = ctx.listener.accept() => Wake::Accept(res),
            _ = wait_ready(&poller.connections) => Wake::Ready,
        };

        // New-connection readiness goes before ordinary connections in the same iteration.
        let accepted = match wake {
            Wake::Shutdown => {
                info!("Shutdown signal received, stopping poll loop.");
                break;
            }
            Wake::Accept(res) => Some(res),
            Wake::Ready => ctx.listener.accept().now_or_never(),
        };
        match accepted {
            Some(Ok((socket, addr))) => poller.admit(ctx, socket, addr),
            Some(Err(e)) => error!("Failed to accept connection: {}", e),
            None => {}
        }

        poller.drain_ready();
    }

    let open = poller.connections.len();
    poller.connections.clear();
    info!("Closed {} polled connections.", open);
}

// src/connection/session.rs

//! Defines the per-connection session state machine.
//!
//! A session starts `Unauthenticated`. A successful `USER` binds it to one account in the
//! shared registry, and `BYE` or teardown releases that account. Teardown releases it
//! through `Drop`, so a dropped client can never leave its account locked.

use crate::core::accounts::{AccountRegistry, LoginOutcome};
use crate::core::activity::{ActivityEvent, ActivityLog};
use crate::core::protocol::{Command, ReplyCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// The authentication state of a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    /// Bound to the named account, whose `in_session` flag this session holds.
    Authenticated(String),
}

/// Holds the state specific to a single client session.
pub struct Session {
    /// The opaque handle of the owning connection.
    session_id: u64,
    peer: SocketAddr,
    state: SessionState,
    registry: Arc<AccountRegistry>,
    activity: ActivityLog,
}

impl Session {
    pub fn new(
        session_id: u64,
        peer: SocketAddr,
        registry: Arc<AccountRegistry>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            session_id,
            peer,
            state: SessionState::Unauthenticated,
            registry,
            activity,
        }
    }

    /// Produces the greeting that opens every admitted connection.
    pub fn greet(&self) -> ReplyCode {
        self.activity.record(ActivityEvent::connected(self.peer));
        ReplyCode::Connected
    }

    /// Interprets one framed line, applies it, and records the exchange.
    pub fn handle_line(&mut self, line: &str) -> ReplyCode {
        let command = Command::parse(line);
        debug!(
            "Session {}: Received command {} from {}",
            self.session_id,
            command.name(),
            self.peer
        );
        let reply = self.apply(command);
        self.activity
            .record(ActivityEvent::new(self.peer, line, reply));
        reply
    }

    /// Runs one transition of the state machine.
    pub fn apply(&mut self, command: Command) -> ReplyCode {
        let authenticated = matches!(self.state, SessionState::Authenticated(_));
        match command {
            Command::User(_) if authenticated => ReplyCode::AlreadyLoggedIn,
            Command::User(name) => match self.registry.try_login(&name) {
                LoginOutcome::Success => {
                    info!(
                        "Session {}: '{}' logged in from {}",
                        self.session_id, name, self.peer
                    );
                    self.state = SessionState::Authenticated(name);
                    ReplyCode::LoginSuccess
                }
                LoginOutcome::NotFound => ReplyCode::AccountUnknown,
                LoginOutcome::Banned => ReplyCode::AccountBanned,
                LoginOutcome::AlreadyActive => ReplyCode::LoggedInElsewhere,
            },
            Command::Post(text) if authenticated => {
                debug!(
                    "Session {}: accepted post of {} bytes",
                    self.session_id,
                    text.len()
                );
                ReplyCode::PostAccepted
            }
            Command::Bye if authenticated => {
                self.release();
                ReplyCode::LogoutSuccess
            }
            Command::Post(_) | Command::Bye => ReplyCode::NotLoggedIn,
            Command::Unknown(_) => ReplyCode::UnknownRequest,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The account this session is bound to, if any.
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(name) => Some(name),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the session to `Unauthenticated`, releasing its account if it held one.
    /// Calling this more than once has no further effect.
    pub fn release(&mut self) {
        if let SessionState::Authenticated(name) =
            std::mem::replace(&mut self.state, SessionState::Unauthenticated)
        {
            self.registry.logout(&name);
            info!("Session {}: '{}' logged out", self.session_id, name);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

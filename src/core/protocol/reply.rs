// src/core/protocol/reply.rs

//! Status codes sent from the server to the client, one line per processed command.

use strum_macros::{Display, EnumString, IntoStaticStr};

/// Every reply the server can produce. The client only has to match the code, never parse text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ReplyCode {
    /// Greeting sent once, immediately after the connection is admitted.
    #[strum(serialize = "100")]
    Connected,
    #[strum(serialize = "110")]
    LoginSuccess,
    #[strum(serialize = "120")]
    PostAccepted,
    #[strum(serialize = "130")]
    LogoutSuccess,
    #[strum(serialize = "211")]
    AccountBanned,
    #[strum(serialize = "212")]
    AccountUnknown,
    /// `USER` on a connection that is already authenticated.
    #[strum(serialize = "213")]
    AlreadyLoggedIn,
    /// `USER` for an account that holds a live session on another connection.
    #[strum(serialize = "214")]
    LoggedInElsewhere,
    #[strum(serialize = "221")]
    NotLoggedIn,
    #[strum(serialize = "300")]
    UnknownRequest,
}

impl ReplyCode {
    /// The numeric code as it appears on the wire, without the terminator.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Every variant except `AccountLoad` ends at most a single connection; a bad account
/// directory stops the process at startup.
#[derive(Error, Debug, Clone)]
pub enum SessionServerError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// A client sent more than the configured maximum line length without a terminator.
    #[error("Line exceeds the maximum length of {limit} bytes")]
    LineTooLong { limit: usize },

    /// The account directory could not be parsed.
    #[error("Account load error at line {line}: {reason}")]
    AccountLoad { line: usize, reason: String },

    /// The connection limit was reached and the connection was refused.
    #[error("Connection limit of {0} reached")]
    ConnectionLimit(usize),
}

impl From<std::io::Error> for SessionServerError {
    fn from(e: std::io::Error) -> Self {
        SessionServerError::Io(Arc::new(e))
    }
}

impl SessionServerError {
    /// Returns true when the error is an ordinary peer disconnect rather than a fault.
    pub fn is_normal_disconnect(&self) -> bool {
        matches!(self, SessionServerError::Io(arc_err) if matches!(
            arc_err.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionAborted
        ))
    }
}

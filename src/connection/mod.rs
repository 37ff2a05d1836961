// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: admission, the session state
//! machine, and the worker that drives one connection under the worker dispatch strategy.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::{Session, SessionState};

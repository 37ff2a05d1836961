// src/core/mod.rs

//! The central module containing the core logic and data structures of sessiond.

pub mod accounts;
pub mod activity;
pub mod errors;
pub mod protocol;
pub mod state;

pub use errors::SessionServerError;
pub use protocol::{Command, ReplyCode};

// src/core/protocol/mod.rs

//! The wire protocol: CRLF-terminated text lines in, short status codes out.

pub mod command;
pub mod line_frame;
pub mod reply;

pub use command::Command;
pub use line_frame::{CRLF, DEFAULT_MAX_LINE_LENGTH, LineCodec, extract, feed, has_complete_line};
pub use reply::ReplyCode;

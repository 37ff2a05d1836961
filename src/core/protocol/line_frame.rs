// src/core/protocol/line_frame.rs

//! Implements incremental CRLF line framing over a boundary-less byte stream,
//! and the corresponding `Encoder` and `Decoder` for network communication.
//!
//! A client may pipeline several commands in one transmission, and a single command
//! may arrive split across several reads. Bytes after the first terminator are always
//! kept in the buffer for the next extraction.

use super::reply::ReplyCode;
use crate::core::SessionServerError;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// The CRLF (Carriage Return, Line Feed) sequence that terminates every protocol line.
pub const CRLF: &[u8] = b"\r\n";
const CRLF_LEN: usize = 2;

/// The default upper bound on a single line, excluding its terminator.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Appends `chunk` to `buffer` and reports whether a complete line is now available.
pub fn feed(buffer: &mut BytesMut, chunk: &[u8]) -> bool {
    buffer.extend_from_slice(chunk);
    find_crlf(buffer).is_some()
}

/// Splits the first complete line off the front of `buffer`.
///
/// Returns `Ok(None)` when no terminator has arrived yet. The remainder stays in `buffer`.
/// A line longer than `max_line_length`, or a buffer that has grown past the point where
/// any terminator could still produce a legal line, is an error.
pub fn extract(
    buffer: &mut BytesMut,
    max_line_length: usize,
) -> Result<Option<String>, SessionServerError> {
    split_line(buffer, 0, max_line_length)
}

/// Finds the next terminator at or after `from` and splits the line off.
fn split_line(
    buffer: &mut BytesMut,
    from: usize,
    max_line_length: usize,
) -> Result<Option<String>, SessionServerError> {
    match find_crlf(&buffer[from..]).map(|offset| from + offset) {
        Some(pos) if pos > max_line_length => Err(SessionServerError::LineTooLong {
            limit: max_line_length,
        }),
        Some(pos) => {
            let line = buffer.split_to(pos + CRLF_LEN);
            Ok(Some(String::from_utf8_lossy(&line[..pos]).into_owned()))
        }
        // A buffer of `max + CRLF_LEN` bytes without a terminator can only hold an oversized line.
        None if buffer.len() >= max_line_length + CRLF_LEN => {
            Err(SessionServerError::LineTooLong {
                limit: max_line_length,
            })
        }
        None => Ok(None),
    }
}

/// A `tokio_util::codec` implementation that decodes CRLF lines and encodes reply codes.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_length: usize,
    /// How far into the buffer has already been scanned without finding a terminator.
    next_index: usize,
}

impl LineCodec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = SessionServerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Step back one byte so a '\r' left at the end of the previous scan is reconsidered.
        let from = self.next_index.saturating_sub(1).min(src.len());
        match split_line(src, from, self.max_line_length) {
            Ok(Some(line)) => {
                self.next_index = 0;
                Ok(Some(line))
            }
            Ok(None) => {
                self.next_index = src.len();
                Ok(None)
            }
            Err(e) => {
                self.next_index = 0;
                Err(e)
            }
        }
    }

    /// An unterminated tail at end of stream is not a command and is dropped silently.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !src.is_empty() {
                    debug!(
                        "Discarding {} bytes of unterminated input at end of stream.",
                        src.len()
                    );
                    src.clear();
                    self.next_index = 0;
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<ReplyCode> for LineCodec {
    type Error = SessionServerError;

    fn encode(&mut self, item: ReplyCode, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let code = item.as_str();
        dst.reserve(code.len() + CRLF_LEN);
        dst.put_slice(code.as_bytes());
        dst.put_slice(CRLF);
        Ok(())
    }
}

/// Returns true if `buffer` already holds at least one complete line.
pub fn has_complete_line(buffer: &[u8]) -> bool {
    find_crlf(buffer).is_some()
}

/// Helper function to find the next CRLF sequence in a buffer.
fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF_LEN).position(|window| window == CRLF)
}

//! Framing codec for Chat-Over-TLS protocol messages.
//!
//! Wire format:
//! ```text
//! [length:4][payload:N]
//! ```
//! `length` is a big-endian u32 equal to the byte length of `payload`, which
//! is UTF-8 JSON.  Frames are never split or merged at the application
//! boundary; a frame either fits the limit or is rejected outright.
//!
//! Both transforms are pure — no sockets, no buffering policy.  The session
//! layer accumulates stream bytes and calls [`decode_message`] until it stops
//! returning [`ProtocolError::Insufficient`].

use thiserror::Error;

use crate::protocol::messages::ChatMessage;

/// Maximum frame payload length in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 65536;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The payload exceeds [`MAX_PAYLOAD_SIZE`].  Applies to outbound
    /// messages at encode time and to the declared length of inbound frames.
    #[error("frame payload too large: {size} bytes (max {MAX_PAYLOAD_SIZE})")]
    TooLarge { size: usize },

    /// The buffer does not yet hold a complete frame.  Not a protocol
    /// violation — the caller should read more bytes and retry.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    Insufficient { needed: usize, available: usize },

    /// The payload is not valid JSON (or the message failed to serialize).
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Encodes a [`ChatMessage`] into one length-prefixed frame.
///
/// # Errors
///
/// Returns [`ProtocolError::TooLarge`] if the JSON payload exceeds
/// [`MAX_PAYLOAD_SIZE`] bytes.
///
/// # Examples
///
/// ```rust
/// use chat_core::{decode_message, encode_message, ChatMessage};
///
/// let msg = ChatMessage::chat("hi");
/// let bytes = encode_message(&msg).unwrap();
/// let (decoded, rest) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert!(rest.is_empty());
/// ```
pub fn encode_message(msg: &ChatMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(msg).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::TooLarge {
            size: payload.len(),
        });
    }

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one [`ChatMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the unconsumed remainder of the input, so
/// pipelined buffers holding more than one frame decode frame-by-frame.
///
/// # Errors
///
/// - [`ProtocolError::Insufficient`] if the buffer holds less than a length
///   prefix, or less than the declared payload — read more and retry.
/// - [`ProtocolError::TooLarge`] if the declared length exceeds
///   [`MAX_PAYLOAD_SIZE`] — the stream is poisoned; no amount of further
///   reading can recover the frame boundary.
/// - [`ProtocolError::Malformed`] if the payload is not valid JSON.
pub fn decode_message(bytes: &[u8]) -> Result<(ChatMessage, &[u8]), ProtocolError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::Insufficient {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        });
    }

    let length = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if length > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::TooLarge { size: length });
    }

    let total = LENGTH_PREFIX_SIZE + length;
    if bytes.len() < total {
        return Err(ProtocolError::Insufficient {
            needed: total,
            available: bytes.len(),
        });
    }

    let msg: ChatMessage = serde_json::from_slice(&bytes[LENGTH_PREFIX_SIZE..total])
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Ok((msg, &bytes[total..]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

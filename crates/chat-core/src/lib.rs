//! # chat-core
//!
//! Shared library for Chat-Over-TLS containing the wire protocol: message
//! types, inbound shape classification, and the length-prefixed framing
//! codec.
//!
//! This crate is pure data transformation.  It has zero dependencies on
//! sockets, TLS, or the async runtime, which keeps every codec path
//! unit-testable without I/O.
//!
//! - **`protocol::messages`** – the [`ChatMessage`] enum exchanged with the
//!   server, plus the shape rules that classify inbound JSON (servers and
//!   older peers sometimes omit the `"type"` discriminator on chat
//!   messages).
//!
//! - **`protocol::codec`** – how bytes travel over the wire.  One frame is a
//!   4-byte big-endian length prefix followed by that many bytes of UTF-8
//!   JSON, capped at 64 KiB.

pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `chat_core::ChatMessage` instead of `chat_core::protocol::messages::ChatMessage`.
pub use protocol::codec::{decode_message, encode_message, ProtocolError, MAX_PAYLOAD_SIZE};
pub use protocol::messages::ChatMessage;

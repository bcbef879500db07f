//! Protocol module containing message types and the framing codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use messages::ChatMessage;

//! Chat-Over-TLS protocol message types.
//!
//! Every frame payload is a JSON object carrying a `"type"` discriminator:
//! `"auth"`, `"auth_result"`, or `"chat"`.  One legacy wrinkle: some peers
//! send chat messages *without* the discriminator, so inbound classification
//! also recognises the bare `{text, sender_ip}` shape.
//!
//! Classification is deliberately an ordered list of shape rules evaluated
//! top-down over decoded JSON (see [`classify`]).  Anything that matches no
//! rule is preserved as [`ChatMessage::Other`] so callers decide whether to
//! ignore it (the listen loop) or report it (the auth handshake).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One protocol message, as written to or read from a frame payload.
///
/// Outbound chat messages carry only `text`; the server stamps `sender_ip`
/// before relaying to the other peer, so inbound chat carries both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatMessage {
    /// Password handshake, sent once immediately after connecting.
    Auth { password: String },

    /// Server verdict on an [`ChatMessage::Auth`] request.
    AuthResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A chat line. `sender_ip` is absent on outbound messages.
    Chat {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sender_ip: Option<String>,
    },

    /// Valid JSON that matched no known shape.  Never constructed locally.
    #[serde(untagged)]
    Other(Value),
}

impl ChatMessage {
    /// Builds an outbound chat message (no sender address).
    pub fn chat(text: impl Into<String>) -> Self {
        ChatMessage::Chat {
            text: text.into(),
            sender_ip: None,
        }
    }

    /// Builds the password handshake message.
    pub fn auth(password: impl Into<String>) -> Self {
        ChatMessage::Auth {
            password: password.into(),
        }
    }

    /// The console line for a displayable inbound message, or `None` if this
    /// message is not something the listen loop shows.
    ///
    /// Only chat messages with a known sender are displayable; everything
    /// else (auth traffic, unknown shapes, chat without a sender) is ignored.
    pub fn display_line(&self) -> Option<String> {
        match self {
            ChatMessage::Chat {
                text,
                sender_ip: Some(ip),
            } => Some(format!("msg from {ip}: {text}")),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ChatMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(classify(value))
    }
}

/// Classifies decoded JSON into a [`ChatMessage`].
///
/// Rules are evaluated top-down; the first match wins:
/// 1. `"type": "auth"` with a string `password`.
/// 2. `"type": "auth_result"` with a bool `success` (optional string `error`).
/// 3. `"type": "chat"` with a string `text` (optional string `sender_ip`).
/// 4. No `"type"` key, but string `text` AND string `sender_ip` — the legacy
///    chat shape.
/// 5. Everything else falls through to [`ChatMessage::Other`].
pub fn classify(value: Value) -> ChatMessage {
    if let Some(msg) = match_known_shape(&value) {
        return msg;
    }
    ChatMessage::Other(value)
}

fn match_known_shape(value: &Value) -> Option<ChatMessage> {
    let obj = value.as_object()?;
    let string_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_owned);

    match obj.get("type").and_then(Value::as_str) {
        Some("auth") => Some(ChatMessage::Auth {
            password: string_field("password")?,
        }),
        Some("auth_result") => Some(ChatMessage::AuthResult {
            success: obj.get("success")?.as_bool()?,
            error: string_field("error"),
        }),
        Some("chat") => Some(ChatMessage::Chat {
            text: string_field("text")?,
            sender_ip: string_field("sender_ip"),
        }),
        Some(_) => None,
        // Legacy form: no discriminator, recognised by shape alone.
        None => match (string_field("text"), string_field("sender_ip")) {
            (Some(text), Some(ip)) => Some(ChatMessage::Chat {
                text,
                sender_ip: Some(ip),
            }),
            _ => None,
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

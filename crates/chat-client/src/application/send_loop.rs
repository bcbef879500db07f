//! Send loop: reads console lines and transmits them as chat messages.
//!
//! Occupies the caller's control flow after authentication, writing the
//! shared session exclusively.  Returning from this loop is the signal that
//! the session is over — either the user ended input or a send failed — and
//! in both cases the session is closed here so the listen loop observes it.

use tracing::{info, warn};

use chat_core::ChatMessage;

use crate::infrastructure::console::{LineInput, LineOutput};
use crate::infrastructure::network::Session;

/// Forwards console lines to the server until end of input or a send failure.
pub async fn run_send_loop(session: &Session, input: &dyn LineInput, output: &dyn LineOutput) {
    loop {
        match input.read_line().await {
            None => {
                info!("console input ended; disconnecting");
                output.write_line("Disconnecting...");
                session.close().await;
                break;
            }
            Some(line) => {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = session.send(&ChatMessage::chat(text)).await {
                    warn!("send failed: {e}");
                    output.write_line(&format!("send failed: {e}"));
                    session.close().await;
                    break;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::infrastructure::console::mock::MockConsole;

    fn session_pair() -> (Session, Session) {
        let (a, b) = tokio::io::duplex(4096);
        (Session::new(a), Session::new(b))
    }

    #[tokio::test]
    async fn test_sends_each_line_as_chat_and_closes_on_eof() {
        let (client, server) = session_pair();
        let console = Arc::new(MockConsole::with_script(&["hello", "world"]));

        run_send_loop(&client, &*console, &*console).await;

        assert_eq!(server.recv().await.unwrap(), ChatMessage::chat("hello"));
        assert_eq!(server.recv().await.unwrap(), ChatMessage::chat("world"));
        assert_eq!(console.written_lines(), vec!["Disconnecting..."]);
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_blank_and_whitespace_lines_are_skipped() {
        let (client, server) = session_pair();
        let console = Arc::new(MockConsole::with_script(&["", "   ", "\t", "real"]));

        run_send_loop(&client, &*console, &*console).await;

        assert_eq!(server.recv().await.unwrap(), ChatMessage::chat("real"));
        // Nothing else was transmitted: the next receive sees the shutdown.
        assert!(server.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_lines_are_trimmed_before_sending() {
        let (client, server) = session_pair();
        let console = Arc::new(MockConsole::with_script(&["  padded  "]));

        run_send_loop(&client, &*console, &*console).await;

        assert_eq!(server.recv().await.unwrap(), ChatMessage::chat("padded"));
    }

    #[tokio::test]
    async fn test_send_failure_reports_and_terminates() {
        let (client, _server) = session_pair();
        // Closing up front makes the first send fail.
        client.close().await;
        let console = Arc::new(MockConsole::with_script(&["doomed", "never sent"]));

        run_send_loop(&client, &*console, &*console).await;

        let lines = console.written_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("send failed:"), "got: {}", lines[0]);
        // The loop stopped at the failure; the second scripted line remains
        // unread, which a later read would observe.
        assert_eq!(console.read_line().await.as_deref(), Some("never sent"));
    }

    #[tokio::test]
    async fn test_immediate_eof_just_disconnects() {
        let (client, _server) = session_pair();
        let console = Arc::new(MockConsole::new());

        run_send_loop(&client, &*console, &*console).await;

        assert_eq!(console.written_lines(), vec!["Disconnecting..."]);
        assert!(client.is_closed());
    }
}

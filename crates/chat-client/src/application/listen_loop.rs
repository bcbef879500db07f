//! Listen loop: continuously decodes inbound messages and displays them.
//!
//! Runs as a spawned task alongside the foreground send loop, reading the
//! shared session exclusively.  Any receive error is fatal to this loop and
//! terminates it cleanly — the loop never retries internally, and it never
//! triggers a reconnect itself; teardown is the state machine's job once the
//! send loop also unwinds.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::infrastructure::console::LineOutput;
use crate::infrastructure::network::{Session, SessionError};

/// Pause before the loop winds down after losing the connection.
pub const LISTEN_LINGER: Duration = Duration::from_millis(2000);

/// Receives and displays inbound chat until the session dies.
pub async fn run_listen_loop(session: Arc<Session>, output: Arc<dyn LineOutput>) {
    loop {
        match session.recv().await {
            Ok(msg) => match msg.display_line() {
                Some(line) => output.write_line(&line),
                // Auth traffic and unknown shapes are silently ignored.
                None => debug!("ignoring non-displayable message"),
            },
            Err(SessionError::Closed) => {
                tokio::time::sleep(LISTEN_LINGER).await;
                output.write_line("connection closed");
                break;
            }
            Err(e) => {
                warn!("listen loop terminating: {e}");
                output.write_line(&format!("receive error: {e}"));
                tokio::time::sleep(LISTEN_LINGER).await;
                break;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

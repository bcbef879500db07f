//! Connection state machine: connect → authenticate → run loops → retry.
//!
//! The lifecycle is an explicit loop over named states rather than recursive
//! retries, so stack usage stays bounded and each transition is testable on
//! its own:
//!
//! ```text
//! Disconnected → Connecting → Authenticating → Authenticated → Disconnected
//!                    ↑              │ (rejection / timeout / error)
//!                    └──────────────┘  backoff, then reconnect
//! ```
//!
//! Backoff timing is asymmetric on purpose: an authentication rejection
//! ("wrong password, try again") retries after 1 s, while network trouble
//! (certificate failures, timeouts, transport errors) waits the full 5 s.
//! An unexpected-but-decodable auth response reconnects immediately.
//!
//! Once authenticated, the listen loop runs as a spawned task while the send
//! loop occupies the caller's control flow.  When the send loop returns (end
//! of console input, or a failed send) the session is torn down and `run`
//! returns to its caller — a voluntary disconnect ends the client rather
//! than re-entering the reconnect loop.

use std::sync::Arc;
use std::time::Duration;

use chat_core::ChatMessage;
use tracing::{debug, info, warn};

use crate::application::{run_listen_loop, run_send_loop};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::console::{run_with_activity, LineInput, LineOutput};
use crate::infrastructure::network::{Session, SessionError};
use crate::infrastructure::tls;

/// How long to wait for the server's verdict on an auth request.
pub const AUTH_RESPONSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Backoff after connect failures, auth timeouts, and transport errors.
pub const CONNECT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Backoff after an explicit authentication rejection.
pub const AUTH_REJECTED_BACKOFF: Duration = Duration::from_millis(1000);

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Authenticated,
}

/// Result of one authentication attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    /// The server accepted the password.
    Accepted,
    /// The server rejected the password, with its stated reason.
    Rejected(String),
    /// The server answered with something other than an auth result.
    UnexpectedResponse,
    /// No answer arrived within [`AUTH_RESPONSE_TIMEOUT`].
    TimedOut,
    /// The send or receive itself failed.
    TransportError(SessionError),
}

/// Sends the password and awaits the server's verdict.
///
/// Strictly sequential: nothing else touches the session until this returns,
/// so the one inline receive cannot interleave with loop traffic.
pub async fn authenticate(session: &Session, password: &str) -> AuthOutcome {
    if let Err(e) = session.send(&ChatMessage::auth(password)).await {
        return AuthOutcome::TransportError(e);
    }

    match session.recv_timeout(AUTH_RESPONSE_TIMEOUT).await {
        Ok(ChatMessage::AuthResult { success: true, .. }) => AuthOutcome::Accepted,
        Ok(ChatMessage::AuthResult {
            success: false,
            error,
        }) => AuthOutcome::Rejected(error.unwrap_or_else(|| "authentication rejected".to_string())),
        Ok(_) => AuthOutcome::UnexpectedResponse,
        Err(SessionError::Timeout) => AuthOutcome::TimedOut,
        Err(e) => AuthOutcome::TransportError(e),
    }
}

/// The wait inserted before the next connection attempt, per outcome.
///
/// `None` means the outcome does not lead back to `Connecting` at all.
pub fn backoff_after(outcome: &AuthOutcome) -> Option<Duration> {
    match outcome {
        AuthOutcome::Accepted => None,
        // Deliberately short: the likely fix is the user retyping the password.
        AuthOutcome::Rejected(_) => Some(AUTH_REJECTED_BACKOFF),
        AuthOutcome::UnexpectedResponse => Some(Duration::ZERO),
        AuthOutcome::TimedOut | AuthOutcome::TransportError(_) => Some(CONNECT_RETRY_BACKOFF),
    }
}

/// The console line shown for a failed authentication attempt.
fn describe_failure(outcome: &AuthOutcome) -> String {
    match outcome {
        AuthOutcome::Accepted => unreachable!("not a failure"),
        AuthOutcome::Rejected(reason) => format!("authentication failed: {reason}"),
        AuthOutcome::UnexpectedResponse => "unexpected response".to_string(),
        AuthOutcome::TimedOut => "timed out waiting for authentication response".to_string(),
        AuthOutcome::TransportError(e) => format!("authentication error: {e}"),
    }
}

/// Drives the full connection lifecycle for one client.
pub struct ChatClient {
    host: String,
    port: u16,
    password: String,
    expected_fingerprint: Option<String>,
    input: Arc<dyn LineInput>,
    output: Arc<dyn LineOutput>,
}

impl ChatClient {
    pub fn new(
        config: &ClientConfig,
        password: String,
        input: Arc<dyn LineInput>,
        output: Arc<dyn LineOutput>,
    ) -> Self {
        Self {
            host: config.connection.host.clone(),
            port: config.connection.port,
            password,
            expected_fingerprint: config.connection.fingerprint.clone(),
            input,
            output,
        }
    }

    /// Runs the connect/authenticate/retry loop until the user disconnects.
    ///
    /// Connection and authentication failures are retried forever with the
    /// backoff table above; only the send loop ending (console EOF or a send
    /// failure) makes this return.
    pub async fn run(&self) {
        let mut state = ConnectionState::Connecting;

        loop {
            debug!(?state, "connection state");

            // ── Connecting ────────────────────────────────────────────────
            let session = match tls::connect(
                &self.host,
                self.port,
                self.expected_fingerprint.as_deref(),
            )
            .await
            {
                Ok(stream) => Arc::new(Session::new(stream)),
                Err(e) => {
                    warn!("connection to {}:{} failed: {e}", self.host, self.port);
                    self.output.write_line(&format!("connect failed: {e}"));
                    self.backoff(CONNECT_RETRY_BACKOFF).await;
                    continue;
                }
            };
            info!("connected to {}:{}", self.host, self.port);

            state = ConnectionState::Authenticating;
            debug!(?state, "connection state");

            // ── Authenticating ────────────────────────────────────────────
            let outcome = authenticate(&session, &self.password).await;
            match outcome {
                AuthOutcome::Accepted => {
                    state = ConnectionState::Authenticated;
                    debug!(?state, "connection state");
                    info!("authenticated");

                    // ── Authenticated ─────────────────────────────────────
                    let listener =
                        tokio::spawn(run_listen_loop(Arc::clone(&session), self.output.clone()));
                    run_send_loop(&session, &*self.input, &*self.output).await;

                    // The send loop has ended: tear down whatever is left.
                    listener.abort();
                    session.close().await;

                    state = ConnectionState::Disconnected;
                    debug!(?state, "connection state");
                    return;
                }
                failure => {
                    self.output.write_line(&describe_failure(&failure));
                    session.close().await;
                    if let Some(wait) = backoff_after(&failure) {
                        if !wait.is_zero() {
                            self.backoff(wait).await;
                        }
                    }
                    state = ConnectionState::Connecting;
                }
            }
        }
    }

    async fn backoff(&self, wait: Duration) {
        run_with_activity("reconnecting", tokio::time::sleep(wait)).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn session_pair() -> (Session, Session) {
        let (a, b) = tokio::io::duplex(4096);
        (Session::new(a), Session::new(b))
    }

    #[tokio::test]
    async fn test_authenticate_accepted() {
        let (client, server) = session_pair();

        let server_task = tokio::spawn(async move {
            let request = server.recv().await.unwrap();
            assert_eq!(request, ChatMessage::auth("letmein"));
            server
                .send(&ChatMessage::AuthResult {
                    success: true,
                    error: None,
                })
                .await
                .unwrap();
        });

        let outcome = authenticate(&client, "letmein").await;
        assert!(matches!(outcome, AuthOutcome::Accepted));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_rejected_carries_reason() {
        let (client, server) = session_pair();

        let server_task = tokio::spawn(async move {
            server.recv().await.unwrap();
            server
                .send(&ChatMessage::AuthResult {
                    success: false,
                    error: Some("bad password".to_string()),
                })
                .await
                .unwrap();
        });

        let outcome = authenticate(&client, "wrong").await;
        match outcome {
            AuthOutcome::Rejected(reason) => assert_eq!(reason, "bad password"),
            other => panic!("expected Rejected, got {other:?}"),
        }
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_rejected_without_reason_uses_default() {
        let (client, server) = session_pair();

        let server_task = tokio::spawn(async move {
            server.recv().await.unwrap();
            server
                .send(&ChatMessage::AuthResult {
                    success: false,
                    error: None,
                })
                .await
                .unwrap();
        });

        match authenticate(&client, "wrong").await {
            AuthOutcome::Rejected(reason) => assert_eq!(reason, "authentication rejected"),
            other => panic!("expected Rejected, got {other:?}"),
        }
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_unexpected_response_shape() {
        let (client, server) = session_pair();

        let server_task = tokio::spawn(async move {
            server.recv().await.unwrap();
            // A chat message is decodable but is not an auth verdict.
            server
                .send(&ChatMessage::Chat {
                    text: "welcome!".to_string(),
                    sender_ip: Some("10.0.0.1".to_string()),
                })
                .await
                .unwrap();
        });

        let outcome = authenticate(&client, "pw").await;
        assert!(matches!(outcome, AuthOutcome::UnexpectedResponse));
        server_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_times_out_after_silence() {
        let (client, server) = session_pair();

        // Server reads the request but never answers; paused time lets the
        // 5000 ms deadline elapse instantly.
        let server_task = tokio::spawn(async move {
            let _request = server.recv().await.unwrap();
            // Hold the session open so the client sees silence, not EOF.
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let outcome = authenticate(&client, "pw").await;
        assert!(matches!(outcome, AuthOutcome::TimedOut));
        server_task.abort();
    }

    #[tokio::test]
    async fn test_authenticate_transport_error_on_peer_close() {
        let (client, server) = session_pair();

        let server_task = tokio::spawn(async move {
            server.recv().await.unwrap();
            server.close().await;
        });

        let outcome = authenticate(&client, "pw").await;
        assert!(matches!(
            outcome,
            AuthOutcome::TransportError(SessionError::Closed)
        ));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_treats_garbage_reply_as_transport_error() {
        // The server answers with a frame whose payload is not JSON. The
        // duplex buffer is large enough that the unread auth request does not
        // block either side.
        let (a, mut b) = tokio::io::duplex(4096);
        let client = Session::new(a);

        let mut frame = 3u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"}{!");
        b.write_all(&frame).await.unwrap();
        b.flush().await.unwrap();

        let outcome = authenticate(&client, "pw").await;
        assert!(matches!(
            outcome,
            AuthOutcome::TransportError(SessionError::Protocol(_))
        ));
    }

    #[test]
    fn test_backoff_table_preserves_asymmetry() {
        assert_eq!(backoff_after(&AuthOutcome::Accepted), None);
        assert_eq!(
            backoff_after(&AuthOutcome::Rejected("no".to_string())),
            Some(AUTH_REJECTED_BACKOFF)
        );
        assert_eq!(
            backoff_after(&AuthOutcome::UnexpectedResponse),
            Some(Duration::ZERO)
        );
        assert_eq!(
            backoff_after(&AuthOutcome::TimedOut),
            Some(CONNECT_RETRY_BACKOFF)
        );
        assert_eq!(
            backoff_after(&AuthOutcome::TransportError(SessionError::Closed)),
            Some(CONNECT_RETRY_BACKOFF)
        );
        // The rejection backoff is the deliberately shorter of the two.
        assert!(AUTH_REJECTED_BACKOFF < CONNECT_RETRY_BACKOFF);
    }

    #[test]
    fn test_failure_descriptions() {
        assert_eq!(
            describe_failure(&AuthOutcome::Rejected("bad password".to_string())),
            "authentication failed: bad password"
        );
        assert_eq!(
            describe_failure(&AuthOutcome::UnexpectedResponse),
            "unexpected response"
        );
        assert_eq!(
            describe_failure(&AuthOutcome::TimedOut),
            "timed out waiting for authentication response"
        );
    }
}

//! Integration tests for the session, handshake, and message loops.
//!
//! These tests exercise the client exactly as the state machine uses it, but
//! over a loopback TCP socket with an in-process fake server speaking the
//! frame protocol.  TLS is deliberately absent: the session layer is
//! transport-agnostic, and the pinning verifier has its own unit tests — here
//! we care about framing, handshake outcomes, and loop behaviour end to end.

use std::sync::Arc;
use std::time::Duration;

use chat_core::ChatMessage;
use tokio::net::{TcpListener, TcpStream};

use chat_client::application::{run_listen_loop, run_send_loop};
use chat_client::infrastructure::console::mock::MockConsole;
use chat_client::infrastructure::network::connection::{authenticate, AuthOutcome};
use chat_client::infrastructure::network::Session;

/// Binds a loopback listener and returns it with its address string.
async fn loopback_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    (listener, addr)
}

/// Polls `condition` every 10 ms until it holds, or panics after 5 s.
async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), deadline)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn test_handshake_and_bidirectional_chat_over_tcp() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, peer) = listener.accept().await.expect("accept");
        let session = Session::new(stream);

        // Expect the password handshake first.
        assert_eq!(
            session.recv().await.expect("auth request"),
            ChatMessage::auth("sesame")
        );
        session
            .send(&ChatMessage::AuthResult {
                success: true,
                error: None,
            })
            .await
            .expect("send verdict");

        // Relay one message to the client, stamped with a sender address the
        // way the real server does.
        session
            .send(&ChatMessage::Chat {
                text: "welcome".to_string(),
                sender_ip: Some(peer.ip().to_string()),
            })
            .await
            .expect("send chat");

        // And receive one from the client.
        let inbound = session.recv().await.expect("client chat");
        assert_eq!(inbound, ChatMessage::chat("hi from client"));

        session.close().await;
    });

    let client = Session::new(TcpStream::connect(&addr).await.expect("connect"));
    let outcome = authenticate(&client, "sesame").await;
    assert!(matches!(outcome, AuthOutcome::Accepted));

    let client = Arc::new(client);
    let console = Arc::new(MockConsole::new());
    let listener_task = tokio::spawn(run_listen_loop(
        Arc::clone(&client),
        console.clone(),
    ));

    client
        .send(&ChatMessage::chat("hi from client"))
        .await
        .expect("client send");

    let console_probe = console.clone();
    wait_for("relayed message to display", move || {
        console_probe
            .written_lines()
            .iter()
            .any(|l| l.starts_with("msg from ") && l.ends_with(": welcome"))
    })
    .await;

    listener_task.abort();
    client.close().await;
    server.await.expect("server task");
}

#[tokio::test]
async fn test_rejected_password_over_tcp() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let session = Session::new(stream);
        session.recv().await.expect("auth request");
        session
            .send(&ChatMessage::AuthResult {
                success: false,
                error: Some("intruder detected".to_string()),
            })
            .await
            .expect("send verdict");
        session.close().await;
    });

    let client = Session::new(TcpStream::connect(&addr).await.expect("connect"));
    match authenticate(&client, "open says me").await {
        AuthOutcome::Rejected(reason) => assert_eq!(reason, "intruder detected"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    client.close().await;
    server.await.expect("server task");
}

#[tokio::test]
async fn test_send_loop_transmits_then_signals_eof_over_tcp() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let session = Session::new(stream);

        assert_eq!(
            session.recv().await.expect("first"),
            ChatMessage::chat("one")
        );
        assert_eq!(
            session.recv().await.expect("second"),
            ChatMessage::chat("two")
        );
        // The client closed after EOF, so the stream ends cleanly.
        assert!(session.recv().await.is_err());
    });

    let client = Session::new(TcpStream::connect(&addr).await.expect("connect"));
    let console = Arc::new(MockConsole::with_script(&["one", "  ", "two"]));

    run_send_loop(&client, &*console, &*console).await;

    assert_eq!(console.written_lines(), vec!["Disconnecting..."]);
    assert!(client.is_closed());
    server.await.expect("server task");
}

#[tokio::test]
async fn test_listen_loop_reports_server_going_away() {
    let (listener, addr) = loopback_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let session = Session::new(stream);
        session
            .send(&ChatMessage::Chat {
                text: "last words".to_string(),
                sender_ip: Some("127.0.0.1".to_string()),
            })
            .await
            .expect("send");
        session.close().await;
    });

    let client = Arc::new(Session::new(TcpStream::connect(&addr).await.expect("connect")));
    let console = Arc::new(MockConsole::new());

    // Runs to completion on its own once the server hangs up (after the
    // 2-second linger).
    run_listen_loop(Arc::clone(&client), console.clone()).await;

    assert_eq!(
        console.written_lines(),
        vec!["msg from 127.0.0.1: last words", "connection closed"]
    );
    server.await.expect("server task");
}

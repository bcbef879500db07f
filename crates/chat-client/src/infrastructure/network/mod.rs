//! Transport session: framed message I/O over one encrypted stream.
//!
//! TCP (and TLS on top of it) is a *stream* protocol: a single read may
//! return less than one complete frame, or more than one.  [`Session::recv`]
//! therefore accumulates bytes and asks the codec for a frame until it stops
//! reporting insufficient data.
//!
//! One session is shared by two loops: the listen loop reads, the send loop
//! writes (the auth handshake does one inline send+receive before either
//! loop starts).  There are never two concurrent readers or two concurrent
//! writers, but *closing* races with whichever loop is still blocked, so
//! [`Session::close`] is idempotent and a blocked peer operation surfaces a
//! clean [`SessionError`] rather than anything undefined.
//!
//! The halves are stored as boxed trait objects so the same session code runs
//! over a TLS stream in production and over `tokio::io::duplex` pipes in
//! tests.

pub mod connection;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chat_core::{decode_message, encode_message, ChatMessage, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// Read chunk size for the receive buffer.
const READ_CHUNK_SIZE: usize = 4096;

/// Errors surfaced by session send/receive operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport was closed — by the peer (EOF) or locally via
    /// [`Session::close`].
    #[error("connection closed")]
    Closed,

    /// A receive with a deadline expired before a full frame arrived.
    #[error("timed out waiting for a message")]
    Timeout,

    /// The byte stream violated the framing protocol (oversized or
    /// malformed frame).  The session is not recoverable past this point.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Any other transport I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

struct FrameReader {
    stream: Box<dyn AsyncRead + Send + Unpin>,
    /// Accumulates stream bytes across reads until a full frame is present.
    buf: Vec<u8>,
}

/// One live transport connection, from completed TLS handshake until close.
pub struct Session {
    reader: Mutex<FrameReader>,
    writer: Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>,
    closed: AtomicBool,
}

impl Session {
    /// Wraps an established stream (TLS in production, any duplex stream in
    /// tests) and splits it into independently lockable halves.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: Mutex::new(FrameReader {
                stream: Box::new(read_half),
                buf: Vec::with_capacity(READ_CHUNK_SIZE),
            }),
            writer: Mutex::new(Some(Box::new(write_half))),
            closed: AtomicBool::new(false),
        }
    }

    /// Receives the next message, blocking until a complete frame arrives.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] on EOF or after a local close;
    /// [`SessionError::Protocol`] on framing violations; [`SessionError::Io`]
    /// on other transport failures.
    pub async fn recv(&self) -> Result<ChatMessage, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let mut reader = self.reader.lock().await;
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            // Try to extract one frame from what we have buffered so far.
            let decoded = match decode_message(&reader.buf) {
                Ok((msg, rest)) => Some((msg, reader.buf.len() - rest.len())),
                Err(ProtocolError::Insufficient { .. }) => None,
                Err(e) => return Err(SessionError::Protocol(e)),
            };
            if let Some((msg, consumed)) = decoded {
                reader.buf.drain(..consumed);
                return Ok(msg);
            }

            let n = reader.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(SessionError::Closed);
            }
            reader.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Like [`Session::recv`] but gives up after `timeout`.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<ChatMessage, SessionError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout),
        }
    }

    /// Encodes and sends one message.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after the session was closed;
    /// [`SessionError::Protocol`] if the message exceeds the frame limit;
    /// [`SessionError::Io`] if the write fails.
    pub async fn send(&self, msg: &ChatMessage) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let bytes = encode_message(msg)?;

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::Closed)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Like [`Session::send`] but gives up after `timeout`.
    pub async fn send_timeout(
        &self,
        msg: &ChatMessage,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        match tokio::time::timeout(timeout, self.send(msg)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout),
        }
    }

    /// Whether [`Session::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shuts the transport down.  Idempotent: the first call takes the
    /// writer and shuts it down, later calls are no-ops.  A loop blocked on
    /// the other half observes `Closed` (or EOF once the peer reacts).
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("shutdown after close: {e}");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

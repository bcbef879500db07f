//! TLS connector with certificate pinning.
//!
//! Trust here is not delegated to the WebPKI: the server presents whatever
//! certificate it likes (usually self-signed), and the client decides by
//! comparing the SHA-256 fingerprint of the leaf certificate's DER bytes
//! against a pre-shared expected value.  With no pinned value configured the
//! client accepts the certificate but warns once, printing the fingerprint to
//! pin and the environment variable to put it in.
//!
//! Intermediate certificates are not individually checked; only the leaf is
//! pinned, at the moment rustls hands it to the verifier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::infrastructure::config::FINGERPRINT_ENV;

/// Errors establishing the encrypted transport.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The configured host is neither a valid DNS name nor an IP address.
    #[error("invalid server name {host:?}: {source}")]
    BadServerName {
        host: String,
        source: rustls::pki_types::InvalidDnsNameError,
    },

    /// The TCP connection could not be established.
    #[error("TCP connect to {addr} failed: {source}")]
    Tcp {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TLS handshake failed.  Certificate pinning rejections surface
    /// here, wrapped by the TLS stack.
    #[error("TLS handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lowercase hex SHA-256 digest of a certificate's DER encoding.
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Formats a hex fingerprint as colon-separated two-digit groups, the shape
/// usually shown by TLS tooling (`ab:cd:ef:…`).
pub fn colon_grouped(fp: &str) -> String {
    fp.as_bytes()
        .chunks(2)
        .map(|pair| std::str::from_utf8(pair).unwrap_or("?"))
        .collect::<Vec<_>>()
        .join(":")
}

/// How a certificate passed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The fingerprint matched the pinned value.
    Verified,
    /// No value was pinned; the certificate was accepted as-is.
    Unverified,
}

/// The presented certificate does not match the pinned fingerprint.
#[derive(Debug, Error, PartialEq)]
#[error("server certificate fingerprint mismatch: expected {expected}, got {actual}")]
pub struct FingerprintMismatch {
    pub expected: String,
    pub actual: String,
}

/// Pure pinning decision: digest the DER bytes and compare against the
/// expected fingerprint, if one is configured.  Comparison is
/// case-insensitive (both sides normalised to lowercase).
pub fn verify_pinned(
    der: &[u8],
    expected: Option<&str>,
) -> Result<VerifyOutcome, FingerprintMismatch> {
    let actual = fingerprint(der);
    match expected {
        Some(exp) if exp.to_ascii_lowercase() == actual => Ok(VerifyOutcome::Verified),
        Some(exp) => Err(FingerprintMismatch {
            expected: exp.to_ascii_lowercase(),
            actual,
        }),
        None => Ok(VerifyOutcome::Unverified),
    }
}

/// Certificate verifier that replaces WebPKI chain validation with leaf
/// fingerprint pinning.
#[derive(Debug)]
pub struct PinnedServerVerifier {
    expected: Option<String>,
    warned: AtomicBool,
}

impl PinnedServerVerifier {
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.map(|f| f.to_ascii_lowercase()),
            warned: AtomicBool::new(false),
        }
    }
}

impl ServerCertVerifier for PinnedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match verify_pinned(end_entity.as_ref(), self.expected.as_deref()) {
            Ok(VerifyOutcome::Verified) => {
                debug!("server certificate matches pinned fingerprint");
                Ok(ServerCertVerified::assertion())
            }
            Ok(VerifyOutcome::Unverified) => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        "no pinned server fingerprint; accepting certificate {}. \
                         Set {FINGERPRINT_ENV} to pin it",
                        colon_grouped(&fingerprint(end_entity.as_ref()))
                    );
                }
                Ok(ServerCertVerified::assertion())
            }
            Err(mismatch) => {
                warn!("{mismatch}");
                Err(rustls::Error::InvalidCertificate(
                    rustls::CertificateError::ApplicationVerificationFailure,
                ))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Opens a TCP connection to `host:port` and completes the TLS handshake
/// with the pinning verifier installed.
///
/// # Errors
///
/// Returns [`ConnectError`] if the name is invalid, the TCP connect fails, or
/// the handshake fails (including a pinning rejection).
pub async fn connect(
    host: &str,
    port: u16,
    expected_fingerprint: Option<&str>,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, ConnectError> {
    let verifier = Arc::new(PinnedServerVerifier::new(
        expected_fingerprint.map(str::to_string),
    ));
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name =
        ServerName::try_from(host.to_string()).map_err(|source| ConnectError::BadServerName {
            host: host.to_string(),
            source,
        })?;

    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| ConnectError::Tcp {
            addr: addr.clone(),
            source,
        })?;

    connector
        .connect(server_name, stream)
        .await
        .map_err(|source| ConnectError::Handshake { addr, source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

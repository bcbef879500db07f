//! Chat-Over-TLS client library.
//!
//! Layout follows the usual split:
//!
//! - **`application`** – the two message loops that run once a session is
//!   authenticated: the listen loop (inbound display) and the send loop
//!   (console → wire).
//! - **`infrastructure`** – everything that touches the outside world:
//!   configuration, console I/O, the TLS connector with certificate pinning,
//!   and the transport session plus the connection state machine.
//!
//! The binary in `main.rs` wires these together; tests drive the same public
//! API over in-memory and loopback transports.

pub mod application;
pub mod infrastructure;

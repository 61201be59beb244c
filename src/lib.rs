//! # Connect Tunnel - HTTP CONNECT Negotiation
//!
//! Client side of the HTTP CONNECT handshake: ask a proxy to open a raw
//! byte pipe to `host:port`, then hand the transport back positioned at the
//! first tunnelled byte (typically the start of a TLS handshake).
//!
//! ## Features
//!
//! - **One state machine, two call styles**: blocking and non-blocking
//!   drivers run the same sans-I/O [`Handshake`]
//! - **Minimal response parsing**: fixed 13-byte status prefix, then a
//!   byte-at-a-time `\r\n\r\n` scanner; nothing is read past the headers
//! - **Callback completion**: [`client::begin_negotiate`] reports exactly once
//! - **Pluggable transports**: anything `Read + Write`, or an
//!   [`AsyncTransport`] such as [`TcpTransport`] or the in-memory
//!   [`ScriptedTransport`]
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                                   Proxy
//!    |                                       |
//!    |-- CONNECT example.com:443 HTTP/1.1 -->|
//!    |   Host: example.com:443               |
//!    |   [Authentication: XAuth <token>]     |
//!    |                                       |
//!    |<-- HTTP/1.1 200 Connection established|
//!    |    ...\r\n\r\n                         |
//!    |                                       |
//!    |======== tunnelled bytes ==============|
//! ```
//!
//! ### State Machine
//!
//! ```text
//!   [AwaitingConnect] --> [AwaitingSendAck] --> [AwaitingHeaderPrefix]
//!                                                        |
//!                                                        v
//!                           [Done] <------------ [ScanningTerminator]
//! ```
//!
//! Every failure goes straight to `Done` with a single outcome.
//!
//! ### Errors
//!
//! | Error             | Raised when                                     |
//! |-------------------|-------------------------------------------------|
//! | `InvalidArgument` | empty/overlong host, port outside 1-65535       |
//! | `Protocol`        | non-200 status or malformed status line         |
//! | `Transport`       | connect failure, short send, early close        |
//!
//! Nothing is retried here; retry policy belongs to the caller.
//!
//! ## Quick Start
//!
//! ### Blocking
//!
//! ```rust,ignore
//! use std::net::TcpStream;
//! use tunnel::{client, NegotiationRequest};
//!
//! let mut stream = TcpStream::connect("proxy.internal:3128")?;
//! let request = NegotiationRequest::new("example.com", 443)?;
//! client::negotiate(&mut stream, &request)?;
//! ```
//!
//! ### Non-blocking
//!
//! ```rust,ignore
//! use tunnel::client::negotiate_async;
//! use tunnel::transport::{TcpTransport, TcpTransportConfig};
//!
//! let mut transport = TcpTransport::new(TcpTransportConfig::new("proxy.internal:3128"));
//! let outcome = negotiate_async(&mut transport, &request).await;
//! assert!(outcome.is_success());
//! let stream = transport.into_stream();
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: request formatting, status validation, scanner, state machine
//! - [`client`]: blocking and non-blocking drivers
//! - [`transport`]: transport traits and implementations
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use client::{HttpConnect, TunnelProtocol};
pub use config::Config;
pub use error::{ProtocolError, Result, TunnelError};
pub use protocol::{format_request, Handshake, NegotiationOutcome, NegotiationRequest};
pub use transport::{AsyncTransport, ScriptedTransport, TcpTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

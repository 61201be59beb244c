//! HTTP CONNECT negotiation protocol.
//!
//! Everything in this module is free of I/O: request encoding, status line
//! validation, the header terminator automaton and the [`Handshake`] state
//! machine that both drivers in [`crate::client`] run.
//!
//! # Message Flow
//!
//! ```text
//! Client                                   Proxy                  Target
//!    |                                       |                       |
//!    |-- CONNECT host:port HTTP/1.1 -------->|                       |
//!    |   Host: host:port                     |------ TCP open ------>|
//!    |   [Authentication: XAuth <token>]     |                       |
//!    |                                       |                       |
//!    |<-- HTTP/1.1 200 ... ------------------|                       |
//!    |    <headers>\r\n\r\n                  |                       |
//!    |                                       |                       |
//!    |====== raw tunnelled bytes (TLS) ======|=======================|
//! ```
//!
//! ## Response Interpretation
//!
//! | Bytes            | Handling                                            |
//! |------------------|-----------------------------------------------------|
//! | 0..13            | [`validate_status_line`]: `HTTP/1.x 200 ` only      |
//! | 13..terminator   | skipped byte by byte through [`ScanState`]          |
//! | after `\r\n\r\n` | untouched, belongs to the tunnel                    |
//!
//! # Usage
//!
//! ```rust,ignore
//! use tunnel::protocol::{Action, Event, Handshake, NegotiationRequest};
//!
//! let request = NegotiationRequest::new("example.com", 443)?;
//! let mut handshake = Handshake::connected(&request);
//!
//! let mut event = Event::Start;
//! loop {
//!     match handshake.resume(event) {
//!         Action::Send(bytes) => event = Event::Sent(stream.write(bytes)),
//!         Action::Receive(buf) => event = Event::Received(stream.read(buf)),
//!         Action::Done(outcome) => break outcome,
//!         Action::Connect | Action::Finished => unreachable!(),
//!     }
//! }
//! ```

mod handshake;
mod outcome;
mod request;
pub mod scanner;
mod status;

pub use handshake::{Action, Event, Handshake, Phase};
pub use outcome::NegotiationOutcome;
pub use request::{format_request, NegotiationRequest, AUTH_HEADER, AUTH_SCHEME};
pub use scanner::{HeaderScanner, ScanState};
pub use status::validate_status_line;

/// Maximum target host length in bytes
pub const MAX_HOST_LEN: usize = 255;

/// Bytes of the response interpreted as the status line prefix
/// (`HTTP/1.1 200` plus the separator).
pub const STATUS_PREFIX_LEN: usize = 13;

//! Blocking negotiation driver.
//!
//! Runs the [`Handshake`] on the calling thread. Every send and receive
//! blocks until the transport completes it or fails; there is no internal
//! timeout.

use crate::error::Result;
use crate::protocol::{Action, Event, Handshake, NegotiationOutcome, NegotiationRequest};
use crate::transport::Transport;

use super::{attempt_span, log_outcome};

/// Negotiate a tunnel over an already connected blocking transport.
///
/// On success the transport is positioned right after the proxy's header
/// terminator and carries tunnelled bytes from here on.
///
/// # Example
///
/// ```rust,ignore
/// use std::net::TcpStream;
/// use tunnel::{client, NegotiationRequest};
///
/// let mut stream = TcpStream::connect("proxy.internal:3128")?;
/// let request = NegotiationRequest::new("example.com", 443)?;
/// client::negotiate(&mut stream, &request)?;
/// // TLS handshake with example.com over `stream`...
/// ```
pub fn negotiate<T: Transport + ?Sized>(
    transport: &mut T,
    request: &NegotiationRequest,
) -> Result<()> {
    let span = attempt_span(request, "blocking");
    let _enter = span.enter();

    let outcome = drive(transport, request);
    log_outcome(&outcome);
    outcome.into_result()
}

/// Validate raw inputs, then negotiate.
///
/// Invalid host, port or token fails with `InvalidArgument` before the
/// transport is touched.
pub fn connect_tunnel<T: Transport + ?Sized>(
    transport: &mut T,
    host: &str,
    port: u32,
    auth_token: Option<&str>,
) -> Result<()> {
    let mut request = NegotiationRequest::new(host, port)?;
    if let Some(token) = auth_token {
        request = request.with_auth_token(token)?;
    }
    negotiate(transport, &request)
}

/// Run the handshake to completion and return its outcome.
pub(crate) fn drive<T: Transport + ?Sized>(
    transport: &mut T,
    request: &NegotiationRequest,
) -> NegotiationOutcome {
    let mut handshake = Handshake::connected(request);
    let mut event = Event::Start;

    loop {
        event = match handshake.resume(event) {
            // Blocking handles arrive connected.
            Action::Connect => Event::Connected(Ok(())),
            Action::Send(bytes) => Event::Sent(transport.send(bytes)),
            Action::Receive(buf) => Event::Received(transport.receive(buf)),
            Action::Done(outcome) => return outcome,
            Action::Finished => unreachable!("handshake resumed after completion"),
        };
    }
}

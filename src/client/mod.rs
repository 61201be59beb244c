//! Negotiation drivers.
//!
//! Two call styles over the one [`Handshake`](crate::protocol::Handshake)
//! state machine:
//!
//! | Driver                   | Transport             | Completion                     |
//! |--------------------------|-----------------------|--------------------------------|
//! | [`negotiate`]            | [`Transport`]         | return value                   |
//! | [`negotiate_async`]      | [`AsyncTransport`]    | awaited outcome                |
//! | [`begin_negotiate`]      | [`AsyncTransport`]    | callback `(Completion, state)` |
//!
//! For identical peer bytes all of them reach the same outcome.
//!
//! [`TunnelProtocol`] is the seam for other tunnelling handshakes; this
//! crate provides [`HttpConnect`].

mod async_driver;
mod sync_driver;

pub use async_driver::{begin_negotiate, negotiate_async, Completion};
pub use sync_driver::{connect_tunnel, negotiate};

use std::future::Future;
use std::pin::Pin;

use crate::protocol::{NegotiationOutcome, NegotiationRequest};
use crate::transport::{AsyncTransport, Transport};

/// A tunnelling handshake that can run over either transport style.
pub trait TunnelProtocol: Send + Sync {
    /// Protocol name for logging.
    fn name(&self) -> &'static str;

    /// Negotiate over a connected blocking transport.
    fn negotiate<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        target: &NegotiationRequest,
    ) -> NegotiationOutcome;

    /// Connect and negotiate over a non-blocking transport.
    fn negotiate_async<'a, T: AsyncTransport + ?Sized>(
        &'a self,
        transport: &'a mut T,
        target: &'a NegotiationRequest,
    ) -> Pin<Box<dyn Future<Output = NegotiationOutcome> + Send + 'a>>;
}

/// HTTP/1.1 CONNECT handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnect;

impl TunnelProtocol for HttpConnect {
    fn name(&self) -> &'static str {
        "HTTP CONNECT"
    }

    fn negotiate<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        target: &NegotiationRequest,
    ) -> NegotiationOutcome {
        let span = attempt_span(target, "blocking");
        let _enter = span.enter();
        let outcome = sync_driver::drive(transport, target);
        log_outcome(&outcome);
        outcome
    }

    fn negotiate_async<'a, T: AsyncTransport + ?Sized>(
        &'a self,
        transport: &'a mut T,
        target: &'a NegotiationRequest,
    ) -> Pin<Box<dyn Future<Output = NegotiationOutcome> + Send + 'a>> {
        Box::pin(negotiate_async(transport, target))
    }
}

/// Span shared by every log line of one attempt.
fn attempt_span(request: &NegotiationRequest, mode: &str) -> tracing::Span {
    tracing::debug_span!(
        "negotiate",
        attempt = %uuid::Uuid::new_v4(),
        target = %request.authority(),
        mode = mode,
        auth = request.auth_token().is_some(),
    )
}

fn log_outcome(outcome: &NegotiationOutcome) {
    match outcome {
        NegotiationOutcome::Success => tracing::info!("tunnel established"),
        NegotiationOutcome::ProtocolError(e) => tracing::warn!("proxy rejected tunnel: {}", e),
        NegotiationOutcome::TransportError(e) => tracing::warn!("tunnel transport failed: {}", e),
    }
}

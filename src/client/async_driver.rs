//! Non-blocking negotiation driver.
//!
//! The same [`Handshake`] as the blocking driver, with every I/O step issued
//! through an [`AsyncTransport`] and resumed when its future completes.
//! Steps of one attempt run strictly in sequence.
//!
//! While scanning for the header terminator the driver first asks the
//! transport for bytes that are already available
//! ([`AsyncTransport::try_receive`]) and only suspends when there are none.

use std::io;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::protocol::{Action, Event, Handshake, NegotiationOutcome, NegotiationRequest};
use crate::transport::AsyncTransport;

use super::{attempt_span, log_outcome};

/// Result handed to a [`begin_negotiate`] callback.
#[derive(Debug)]
pub struct Completion<T> {
    /// How the attempt ended.
    pub outcome: NegotiationOutcome,
    /// The transport, returned to its owner whatever the outcome.
    pub transport: T,
}

/// Connect the transport and negotiate a tunnel.
///
/// Returns the attempt's single outcome. On success the transport is
/// positioned right after the proxy's header terminator.
pub async fn negotiate_async<T: AsyncTransport + ?Sized>(
    transport: &mut T,
    request: &NegotiationRequest,
) -> NegotiationOutcome {
    let span = attempt_span(request, transport.name());
    async {
        let outcome = drive(transport, request).await;
        log_outcome(&outcome);
        outcome
    }
    .instrument(span)
    .await
}

/// Start a negotiation on the current tokio runtime and report through
/// `callback`.
///
/// `callback` runs exactly once with the outcome and the transport,
/// followed by `user_state`. If the task is dropped before the handshake
/// finishes (`JoinHandle::abort`, runtime shutdown, a panicking transport),
/// it still runs, with a `TransportError` of kind `Interrupted`. Must be
/// called from within a tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// use tunnel::client::begin_negotiate;
/// use tunnel::transport::{TcpTransport, TcpTransportConfig};
///
/// let transport = TcpTransport::new(TcpTransportConfig::new("proxy.internal:3128"));
/// let (tx, rx) = tokio::sync::oneshot::channel();
/// begin_negotiate(transport, request, tx, |completion, tx| {
///     let _ = tx.send(completion);
/// });
/// let completion = rx.await?;
/// ```
pub fn begin_negotiate<T, U, F>(
    transport: T,
    request: NegotiationRequest,
    user_state: U,
    callback: F,
) -> JoinHandle<()>
where
    T: AsyncTransport + 'static,
    U: Send + 'static,
    F: FnOnce(Completion<T>, U) + Send + 'static,
{
    // Built outside the task so an abort before the first poll still reports.
    let mut guard = CompletionGuard {
        transport: Some(transport),
        pending: Some((user_state, callback)),
    };

    tokio::spawn(async move {
        let outcome = match guard.transport.as_mut() {
            Some(transport) => negotiate_async(transport, &request).await,
            None => return,
        };
        guard.complete(outcome);
    })
}

/// Owns everything the callback needs until it has run.
struct CompletionGuard<T, U, F>
where
    F: FnOnce(Completion<T>, U),
{
    transport: Option<T>,
    pending: Option<(U, F)>,
}

impl<T, U, F> CompletionGuard<T, U, F>
where
    F: FnOnce(Completion<T>, U),
{
    fn complete(&mut self, outcome: NegotiationOutcome) {
        if let (Some(transport), Some((user_state, callback))) =
            (self.transport.take(), self.pending.take())
        {
            callback(Completion { outcome, transport }, user_state);
        }
    }
}

impl<T, U, F> Drop for CompletionGuard<T, U, F>
where
    F: FnOnce(Completion<T>, U),
{
    fn drop(&mut self) {
        if self.pending.is_some() {
            tracing::warn!("negotiation abandoned before completion");
            self.complete(NegotiationOutcome::TransportError(io::Error::new(
                io::ErrorKind::Interrupted,
                "negotiation abandoned before completion",
            )));
        }
    }
}

pub(crate) async fn drive<T: AsyncTransport + ?Sized>(
    transport: &mut T,
    request: &NegotiationRequest,
) -> NegotiationOutcome {
    let mut handshake = Handshake::new(request);
    let mut event = Event::Start;

    loop {
        event = match handshake.resume(event) {
            Action::Connect => Event::Connected(transport.connect().await),
            Action::Send(bytes) => Event::Sent(transport.send(bytes).await),
            Action::Receive(buf) => Event::Received(receive(transport, buf).await),
            Action::Done(outcome) => return outcome,
            Action::Finished => unreachable!("handshake resumed after completion"),
        };
    }
}

async fn receive<T: AsyncTransport + ?Sized>(transport: &mut T, buf: &mut [u8]) -> io::Result<usize> {
    if let Some(n) = transport.try_receive(buf)? {
        return Ok(n);
    }
    transport.receive(buf).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::transport::ScriptedTransport;

    fn request() -> NegotiationRequest {
        NegotiationRequest::new("example.com", 443).unwrap()
    }

    #[test]
    fn test_connects_then_negotiates() {
        let mut transport =
            ScriptedTransport::with_chunks([b"HTTP/1.1 200 Connection established\r\n\r\n"]);
        let outcome = tokio_test::block_on(negotiate_async(&mut transport, &request()));
        assert!(outcome.is_success());
        assert_eq!(transport.connects(), 1);
        assert_eq!(
            transport.written(),
            b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n"
        );
    }

    #[test]
    fn test_scans_available_bytes_without_suspending() {
        let response = b"HTTP/1.1 200 Connection established\r\n\r\n";
        let mut transport = ScriptedTransport::with_chunks([response]);
        let outcome = tokio_test::block_on(negotiate_async(&mut transport, &request()));
        assert!(outcome.is_success());
        // Only the status prefix read suspends; the rest is already there.
        assert_eq!(transport.suspended_receives(), 1);
        assert_eq!(transport.receives(), 1 + response.len() - 13);
    }

    #[test]
    fn test_accumulates_short_prefix_reads() {
        let mut transport = ScriptedTransport::with_chunks([
            &b"HTTP"[..],
            b"/1.1",
            b" 20",
            b"0 OK\r\n",
            b"\r\n",
        ]);
        let outcome = tokio_test::block_on(negotiate_async(&mut transport, &request()));
        assert!(outcome.is_success());
        assert!(transport.suspended_receives() >= 5);
    }

    #[test]
    fn test_connect_failure_short_circuits() {
        let mut transport = ScriptedTransport::with_chunks([b"HTTP/1.1 200 OK\r\n\r\n"])
            .failing_connect(io::ErrorKind::ConnectionRefused);
        let outcome = tokio_test::block_on(negotiate_async(&mut transport, &request()));
        match outcome {
            NegotiationOutcome::TransportError(e) => {
                assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused);
            },
            other => panic!("Expected transport error, got {other:?}"),
        }
        assert_eq!(transport.sends(), 0);
        assert_eq!(transport.receives(), 0);
    }

    #[test]
    fn test_status_failure_stops_io() {
        let mut transport = ScriptedTransport::with_chunks([b"HTTP/1.1 502 Bad Gateway\r\n\r\n"]);
        let outcome = tokio_test::block_on(negotiate_async(&mut transport, &request()));
        assert!(matches!(
            outcome,
            NegotiationOutcome::ProtocolError(ProtocolError::Status(502))
        ));
        // Nothing past the status prefix was read.
        assert_eq!(transport.receives(), 1);
    }

    #[tokio::test]
    async fn test_callback_runs_once_with_state() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let transport = ScriptedTransport::with_chunks([&b"HTTP/1.0 200 OK\r\n\r\nDATA"[..]]);

        let handle = begin_negotiate(transport, request(), (tx, 42u32), |completion, (tx, tag)| {
            let _ = tx.send((completion, tag));
        });
        handle.await.unwrap();

        let (completion, tag) = rx.await.unwrap();
        assert_eq!(tag, 42);
        assert!(completion.outcome.is_success());
        assert_eq!(completion.transport.remaining(), b"DATA");
    }

    /// Connects and sends, then never delivers a byte.
    struct Stalled;

    impl AsyncTransport for Stalled {
        fn connect(&mut self) -> crate::transport::IoFuture<'_, ()> {
            Box::pin(std::future::ready(Ok(())))
        }

        fn send<'a>(&'a mut self, buf: &'a [u8]) -> crate::transport::IoFuture<'a, usize> {
            Box::pin(std::future::ready(Ok(buf.len())))
        }

        fn receive<'a>(&'a mut self, _buf: &'a mut [u8]) -> crate::transport::IoFuture<'a, usize> {
            Box::pin(std::future::pending())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_aborted_attempt_still_calls_back_once() {
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let counter = calls.clone();
        let handle = begin_negotiate(Stalled, request(), tx, move |completion, tx| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let _ = tx.send(completion.outcome);
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        match rx.await.unwrap() {
            NegotiationOutcome::TransportError(e) => {
                assert_eq!(e.kind(), io::ErrorKind::Interrupted);
            },
            other => panic!("Expected interrupted transport, got {other:?}"),
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_before_first_poll_calls_back() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = begin_negotiate(Stalled, request(), tx, |completion, tx| {
            let _ = tx.send(completion.outcome.kind());
        });
        handle.abort();
        let _ = handle.await;

        assert_eq!(rx.await.unwrap(), "transport_error");
    }

    #[tokio::test]
    async fn test_callback_receives_failure() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let transport = ScriptedTransport::with_chunks([b"HTTP/1.1 20"]);

        begin_negotiate(transport, request(), tx, |completion, tx| {
            let _ = tx.send(completion);
        })
        .await
        .unwrap();

        let completion = rx.await.unwrap();
        assert!(matches!(
            completion.outcome,
            NegotiationOutcome::TransportError(ref e) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }
}

//! Sans-I/O CONNECT handshake state machine.
//!
//! [`Handshake`] owns every buffer of one negotiation attempt and tells its
//! driver which I/O to perform next. The blocking and the non-blocking
//! drivers differ only in how they carry out the returned [`Action`]s.
//!
//! # State Machine
//!
//! ```text
//!                 Connected(Ok)           Sent(Ok(n == len))
//!  [AwaitingConnect] ------> [AwaitingSendAck] ------> [AwaitingHeaderPrefix]
//!                                                         |   ^
//!                                                         |   | Received(n), < 13 bytes
//!                                                         |---+
//!                                                         | 13 bytes, status 200
//!                                                         v
//!                              Received(1), not \r\n\r\n [ScanningTerminator]
//!                                                    +--->|   |
//!                                                    +----+   | \r\n\r\n seen
//!                                                             v
//!                                                          [Done]
//! ```
//!
//! Any error, zero-length read, short send or non-200 status moves straight
//! to `Done`. The outcome is handed out once, in [`Action::Done`]; resuming
//! a finished machine only yields [`Action::Finished`].
//!
//! The terminator is scanned one byte per receive, so the machine never
//! asks for a byte past the end of the headers. After success the transport
//! is positioned at the first tunnelled byte and nothing has been buffered.

use std::fmt;
use std::io;

use super::outcome::NegotiationOutcome;
use super::request::NegotiationRequest;
use super::scanner::{HeaderScanner, ScanState};
use super::status::validate_status_line;
use super::STATUS_PREFIX_LEN;

/// Where the attempt currently waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Connect requested, waiting for its completion
    AwaitingConnect,
    /// Request sent (or about to be), waiting for the send result
    AwaitingSendAck,
    /// Accumulating the fixed-size status line prefix
    AwaitingHeaderPrefix,
    /// Reading single bytes until the header terminator
    ScanningTerminator,
    /// Outcome produced
    Done,
}

/// Completion fed back into the machine.
#[derive(Debug)]
pub enum Event {
    /// Kick off the attempt.
    Start,
    /// Result of [`Action::Connect`].
    Connected(io::Result<()>),
    /// Result of [`Action::Send`]: bytes accepted by the transport.
    Sent(io::Result<usize>),
    /// Result of [`Action::Receive`]: bytes written into the given slice.
    Received(io::Result<usize>),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Connected(_) => write!(f, "connect completion"),
            Self::Sent(_) => write!(f, "send completion"),
            Self::Received(_) => write!(f, "receive completion"),
        }
    }
}

/// Next step requested from the driver.
#[derive(Debug)]
pub enum Action<'a> {
    /// Connect the transport.
    Connect,
    /// Send these bytes in a single call.
    Send(&'a [u8]),
    /// Receive into this slice (at most its length).
    Receive(&'a mut [u8]),
    /// Attempt finished.
    Done(NegotiationOutcome),
    /// Resumed after `Done`; nothing left to do.
    Finished,
}

/// State of one negotiation attempt.
#[derive(Debug, Clone)]
pub struct Handshake {
    phase: Phase,
    request: Vec<u8>,
    prefix: [u8; STATUS_PREFIX_LEN],
    prefix_len: usize,
    byte: [u8; 1],
    scanner: HeaderScanner,
}

impl Handshake {
    /// Machine for a transport that still has to be connected.
    pub fn new(request: &NegotiationRequest) -> Self {
        Self::with_phase(request, Phase::AwaitingConnect)
    }

    /// Machine for a transport that is already connected.
    pub fn connected(request: &NegotiationRequest) -> Self {
        Self::with_phase(request, Phase::AwaitingSendAck)
    }

    fn with_phase(request: &NegotiationRequest, phase: Phase) -> Self {
        Self {
            phase,
            request: request.to_bytes(),
            prefix: [0; STATUS_PREFIX_LEN],
            prefix_len: 0,
            byte: [0],
            scanner: HeaderScanner::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Check if the outcome has been produced.
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Encoded CONNECT request.
    pub fn request_bytes(&self) -> &[u8] {
        &self.request
    }

    /// Status line prefix bytes received so far.
    pub fn status_prefix(&self) -> &[u8] {
        &self.prefix[..self.prefix_len]
    }

    /// Terminator scan progress.
    pub fn scan_state(&self) -> ScanState {
        self.scanner.state()
    }

    /// Response bytes consumed so far (prefix plus scanned header bytes).
    pub fn response_bytes(&self) -> usize {
        self.prefix_len + self.scanner.consumed()
    }

    /// Feed a completion and get the next action.
    pub fn resume(&mut self, event: Event) -> Action<'_> {
        match (self.phase, event) {
            (Phase::Done, _) => Action::Finished,

            (Phase::AwaitingConnect, Event::Start) => Action::Connect,
            (Phase::AwaitingConnect, Event::Connected(Ok(()))) => {
                tracing::debug!("transport connected, sending {} byte request", self.request.len());
                self.phase = Phase::AwaitingSendAck;
                Action::Send(&self.request)
            },
            (Phase::AwaitingConnect, Event::Connected(Err(e))) => self.fail(e.into()),

            (Phase::AwaitingSendAck, Event::Start) => Action::Send(&self.request),
            (Phase::AwaitingSendAck, Event::Sent(Ok(n))) => {
                if n < self.request.len() {
                    return self.fail(
                        io::Error::new(
                            io::ErrorKind::WriteZero,
                            format!("short send: {n} of {} bytes accepted", self.request.len()),
                        )
                        .into(),
                    );
                }
                tracing::debug!("request sent, awaiting status line");
                self.phase = Phase::AwaitingHeaderPrefix;
                Action::Receive(&mut self.prefix[..])
            },
            (Phase::AwaitingSendAck, Event::Sent(Err(e))) => self.fail(e.into()),

            (Phase::AwaitingHeaderPrefix | Phase::ScanningTerminator, Event::Received(Ok(0))) => {
                let received = self.response_bytes();
                self.fail(
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("proxy closed connection after {received} response bytes"),
                    )
                    .into(),
                )
            },
            (Phase::AwaitingHeaderPrefix | Phase::ScanningTerminator, Event::Received(Err(e))) => {
                self.fail(e.into())
            },

            (Phase::AwaitingHeaderPrefix, Event::Received(Ok(n))) => {
                self.prefix_len = (self.prefix_len + n).min(STATUS_PREFIX_LEN);
                if self.prefix_len < STATUS_PREFIX_LEN {
                    tracing::trace!("status prefix {}/{STATUS_PREFIX_LEN}", self.prefix_len);
                    return Action::Receive(&mut self.prefix[self.prefix_len..]);
                }
                if let Err(e) = validate_status_line(&self.prefix) {
                    return self.fail(e.into());
                }
                tracing::debug!("status line accepted, scanning for header terminator");
                self.phase = Phase::ScanningTerminator;
                Action::Receive(&mut self.byte[..])
            },

            (Phase::ScanningTerminator, Event::Received(Ok(_))) => {
                if self.scanner.feed(self.byte[0]) {
                    tracing::debug!("header terminator after {} bytes", self.response_bytes());
                    self.phase = Phase::Done;
                    return Action::Done(NegotiationOutcome::Success);
                }
                Action::Receive(&mut self.byte[..])
            },

            (phase, event) => self.fail(
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unexpected {event} in phase {phase:?}"),
                )
                .into(),
            ),
        }
    }

    fn fail(&mut self, outcome: NegotiationOutcome) -> Action<'_> {
        tracing::debug!("handshake failed in phase {:?}: {}", self.phase, outcome);
        self.phase = Phase::Done;
        Action::Done(outcome)
    }
}

//! Terminal result of a negotiation attempt.

use std::io;

use crate::error::{ProtocolError, Result, TunnelError};

/// How a negotiation attempt ended. Produced exactly once per attempt.
#[derive(Debug)]
pub enum NegotiationOutcome {
    /// Tunnel established; the transport is positioned after the headers.
    Success,
    /// Proxy replied with a non-200 or unparseable status line.
    ProtocolError(ProtocolError),
    /// Transport failed or the peer closed early.
    TransportError(io::Error),
}

impl NegotiationOutcome {
    /// Check if the tunnel is ready.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ProtocolError(_) => "protocol_error",
            Self::TransportError(_) => "transport_error",
        }
    }

    /// Convert into the crate's `Result`.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::ProtocolError(e) => Err(TunnelError::Protocol(e)),
            Self::TransportError(e) => Err(TunnelError::Transport(e)),
        }
    }

    /// Compare outcomes by kind and detail, ignoring io::Error identity.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Success, Self::Success) => true,
            (Self::ProtocolError(a), Self::ProtocolError(b)) => a == b,
            (Self::TransportError(a), Self::TransportError(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

impl std::fmt::Display for NegotiationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "tunnel established"),
            Self::ProtocolError(e) => write!(f, "{e}"),
            Self::TransportError(e) => write!(f, "transport failed: {e}"),
        }
    }
}

impl From<ProtocolError> for NegotiationOutcome {
    fn from(err: ProtocolError) -> Self {
        Self::ProtocolError(err)
    }
}

impl From<io::Error> for NegotiationOutcome {
    fn from(err: io::Error) -> Self {
        Self::TransportError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        assert!(NegotiationOutcome::Success.into_result().is_ok());

        let err = NegotiationOutcome::from(ProtocolError::Status(407))
            .into_result()
            .unwrap_err();
        assert!(err.is_protocol());

        let err = NegotiationOutcome::from(io::Error::from(io::ErrorKind::UnexpectedEof))
            .into_result()
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_same_as_compares_detail() {
        let a = NegotiationOutcome::from(ProtocolError::Status(407));
        let b = NegotiationOutcome::from(ProtocolError::Status(407));
        let c = NegotiationOutcome::from(ProtocolError::Status(502));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));

        let eof = |msg: &str| {
            NegotiationOutcome::from(io::Error::new(io::ErrorKind::UnexpectedEof, msg.to_string()))
        };
        assert!(eof("one").same_as(&eof("two")));
        assert!(!eof("one").same_as(&NegotiationOutcome::Success));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(NegotiationOutcome::Success.kind(), "success");
        assert_eq!(
            NegotiationOutcome::from(ProtocolError::Status(404)).kind(),
            "protocol_error"
        );
    }
}

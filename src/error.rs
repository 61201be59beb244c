//! Tunnel negotiation error types.
//!
//! # Classification
//!
//! Every failure falls into one of three buckets, none of which is retried
//! by this crate:
//!
//! - **InvalidArgument**: the target host, port or token was rejected before
//!   any I/O took place. The caller has to fix its inputs.
//! - **Protocol**: the proxy answered, but not with an HTTP/1.x `200`.
//!   The caller may retry with different credentials or give up.
//! - **Transport**: connect failure, short send, read error or the peer
//!   closing before the headers were complete.
//!
//! `Config` covers configuration loading and is never produced by a driver.

use thiserror::Error;

/// Proxy answered with something other than an accepted status line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Well-formed HTTP/1.x status line with a non-200 code.
    #[error("proxy refused tunnel with status {0}")]
    Status(u16),

    /// Status line prefix could not be interpreted.
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),
}

impl ProtocolError {
    /// Status code carried by the error, if the line was well-formed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            Self::MalformedStatusLine(_) => None,
        }
    }
}

/// Tunnel errors.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Rejected input, raised before any network activity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Proxy response did not confirm the tunnel.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Underlying transport failed or closed early.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for tunnel operations
pub type Result<T> = std::result::Result<T, TunnelError>;

impl TunnelError {
    /// Check if this is an input validation failure.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if the proxy rejected or garbled the handshake.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Check if the transport failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<toml::de::Error> for TunnelError {
    fn from(err: toml::de::Error) -> Self {
        TunnelError::Config(err.to_string())
    }
}

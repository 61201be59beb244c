//! CONNECT request construction.
//!
//! A [`NegotiationRequest`] is validated once, when it is built, so that an
//! invalid host or port never reaches a transport.

use std::fmt;

use super::MAX_HOST_LEN;
use crate::error::{Result, TunnelError};

/// Header carrying the proxy credential.
pub const AUTH_HEADER: &str = "Authentication";

/// Scheme prefix of the credential value.
pub const AUTH_SCHEME: &str = "XAuth";

/// Target of one negotiation attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct NegotiationRequest {
    host: String,
    port: u16,
    auth_token: Option<String>,
}

impl NegotiationRequest {
    /// Create a request for `host:port`.
    ///
    /// `port` is taken as `u32` so that out-of-range values coming from
    /// configuration or the command line are rejected here rather than
    /// silently truncated.
    pub fn new(host: impl Into<String>, port: u32) -> Result<Self> {
        let host = host.into();
        validate_host(&host)?;
        let port = validate_port(port)?;

        Ok(Self {
            host,
            port,
            auth_token: None,
        })
    }

    /// Attach a credential. An empty token means "no auth header".
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.bytes().any(|b| b == b'\r' || b == b'\n') {
            return Err(TunnelError::InvalidArgument(
                "auth token contains CR or LF".to_string(),
            ));
        }
        if !token.is_ascii() {
            return Err(TunnelError::InvalidArgument(
                "auth token contains non-ASCII characters".to_string(),
            ));
        }
        self.auth_token = if token.is_empty() { None } else { Some(token) };
        Ok(self)
    }

    /// Target host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Configured credential, if any.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// `host:port` authority as used in the request line and Host header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Encode the CONNECT request.
    pub fn to_bytes(&self) -> Vec<u8> {
        let authority = self.authority();
        let mut out = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
        if let Some(token) = &self.auth_token {
            out.push_str(&format!("{AUTH_HEADER}: {AUTH_SCHEME} {token}\r\n"));
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for NegotiationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Validate inputs and encode a CONNECT request in one step.
pub fn format_request(host: &str, port: u32, auth_token: Option<&str>) -> Result<Vec<u8>> {
    let mut request = NegotiationRequest::new(host, port)?;
    if let Some(token) = auth_token {
        request = request.with_auth_token(token)?;
    }
    Ok(request.to_bytes())
}

fn validate_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(TunnelError::InvalidArgument("host is empty".to_string()));
    }
    if host.len() > MAX_HOST_LEN {
        return Err(TunnelError::InvalidArgument(format!(
            "host is {} bytes, limit is {MAX_HOST_LEN}",
            host.len()
        )));
    }
    if !host.is_ascii() {
        return Err(TunnelError::InvalidArgument(
            "host contains non-ASCII characters".to_string(),
        ));
    }
    if host.bytes().any(|b| b.is_ascii_control() || b == b' ') {
        return Err(TunnelError::InvalidArgument(
            "host contains whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_port(port: u32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(TunnelError::InvalidArgument(format!(
            "port {port} out of range 1-65535"
        ))),
    }
}

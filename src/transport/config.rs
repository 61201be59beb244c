//! TCP transport configuration.
//!
//! Connect and I/O deadlines live here because timeout policy belongs to
//! the transport handle. The negotiation drivers wait for as long as the
//! transport lets them.

use std::time::Duration;

/// Settings for reaching the proxy over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTransportConfig {
    /// Proxy address as `host:port` (resolved at connect time).
    pub proxy_addr: String,
    /// Maximum time to establish the TCP connection.
    pub connect_timeout: Duration,
    /// Per-operation send/receive deadline; `None` waits indefinitely.
    pub io_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on the connected socket.
    pub nodelay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            proxy_addr: "127.0.0.1:8080".to_string(),
            connect_timeout: Duration::from_secs(10),
            io_timeout: None,
            nodelay: true,
        }
    }
}

impl TcpTransportConfig {
    /// Create configuration for a proxy address.
    pub fn new(proxy_addr: impl Into<String>) -> Self {
        Self {
            proxy_addr: proxy_addr.into(),
            ..Default::default()
        }
    }

    /// Set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set per-operation I/O deadline.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Set TCP_NODELAY.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_config_default() {
        let config = TcpTransportConfig::default();
        assert_eq!(config.proxy_addr, "127.0.0.1:8080");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.io_timeout.is_none());
        assert!(config.nodelay);
    }

    #[test]
    fn test_tcp_config_builder() {
        let config = TcpTransportConfig::new("proxy.internal:3128")
            .with_connect_timeout(Duration::from_secs(2))
            .with_io_timeout(Some(Duration::from_secs(30)))
            .with_nodelay(false);
        assert_eq!(config.proxy_addr, "proxy.internal:3128");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.io_timeout, Some(Duration::from_secs(30)));
        assert!(!config.nodelay);
    }
}

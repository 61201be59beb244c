//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (merged on top by the binary)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunnelError};
use crate::protocol::NegotiationRequest;
use crate::transport::TcpTransportConfig;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Proxy configuration
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Tunnel target
    #[serde(default)]
    pub target: TargetConfig,

    /// Transport deadlines
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TunnelError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Default config file location (`<config dir>/tunnel/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tunnel").join("config.toml"))
    }

    /// Load the default config file if it exists, defaults otherwise
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Proxy settings
        if let Ok(host) = std::env::var("TUNNEL_PROXY_HOST") {
            config.proxy.host = host;
        }
        if let Some(port) = parse_env("TUNNEL_PROXY_PORT") {
            config.proxy.port = port;
        }
        if let Ok(token) = std::env::var("TUNNEL_AUTH_TOKEN") {
            config.proxy.auth_token = Some(token);
        }

        // Target settings
        if let Ok(host) = std::env::var("TUNNEL_TARGET_HOST") {
            config.target.host = Some(host);
        }
        if let Some(port) = parse_env("TUNNEL_TARGET_PORT") {
            config.target.port = port;
        }

        // Transport settings
        if let Some(secs) = parse_env("TUNNEL_CONNECT_TIMEOUT") {
            config.transport.connect_timeout_secs = secs;
        }

        config
    }

    /// Merge with another config (other takes precedence where it differs
    /// from the defaults)
    pub fn merge(self, other: Self) -> Self {
        let proxy_defaults = ProxyConfig::default();
        let target_defaults = TargetConfig::default();
        let transport_defaults = TransportConfig::default();

        Self {
            proxy: ProxyConfig {
                host: if other.proxy.host != proxy_defaults.host {
                    other.proxy.host
                } else {
                    self.proxy.host
                },
                port: if other.proxy.port != proxy_defaults.port {
                    other.proxy.port
                } else {
                    self.proxy.port
                },
                auth_token: other.proxy.auth_token.or(self.proxy.auth_token),
            },
            target: TargetConfig {
                host: other.target.host.or(self.target.host),
                port: if other.target.port != target_defaults.port {
                    other.target.port
                } else {
                    self.target.port
                },
            },
            transport: TransportConfig {
                connect_timeout_secs: if other.transport.connect_timeout_secs
                    != transport_defaults.connect_timeout_secs
                {
                    other.transport.connect_timeout_secs
                } else {
                    self.transport.connect_timeout_secs
                },
                io_timeout_secs: other.transport.io_timeout_secs.or(self.transport.io_timeout_secs),
            },
        }
    }

    /// Build the negotiation request for the configured target
    pub fn request(&self) -> Result<NegotiationRequest> {
        let host = self
            .target
            .host
            .as_deref()
            .ok_or_else(|| TunnelError::InvalidArgument("no target host configured".to_string()))?;

        let request = NegotiationRequest::new(host, self.target.port)?;
        match &self.proxy.auth_token {
            Some(token) => request.with_auth_token(token.as_str()),
            None => Ok(request),
        }
    }

    /// TCP transport settings for reaching the proxy
    pub fn tcp_transport(&self) -> TcpTransportConfig {
        TcpTransportConfig::new(self.proxy.addr())
            .with_connect_timeout(Duration::from_secs(self.transport.connect_timeout_secs))
            .with_io_timeout(self.transport.io_timeout_secs.map(Duration::from_secs))
    }
}

/// Read and parse a numeric environment variable. Unparsable values are
/// ignored with a warning.
fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring {}={:?}: not a valid number", name, raw);
            None
        },
    }
}

/// Proxy configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy host
    pub host: String,

    /// Proxy port
    pub port: u16,

    /// Credential sent as `Authentication: XAuth <token>`
    pub auth_token: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth_token: None,
        }
    }
}

impl ProxyConfig {
    /// Get the proxy address
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Tunnel target configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target host (required before connecting)
    pub host: Option<String>,

    /// Target port; kept wide so out-of-range values surface as
    /// `InvalidArgument` instead of a parse error
    pub port: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 443,
        }
    }
}

/// Transport deadline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Send/receive deadline in seconds (none = wait indefinitely)
    pub io_timeout_secs: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            io_timeout_secs: None,
        }
    }
}

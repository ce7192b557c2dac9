//! Configuration schema definitions.

use axum::http::header::HeaderName;
use axum::http::Uri;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Which side of the tunnel this sidecar serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// In front of the caller: encrypts requests, decrypts responses.
    Egress,
    /// In front of the callee: decrypts requests, encrypts responses.
    Ingress,
}

impl ProxyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMode::Egress => "egress",
            ProxyMode::Ingress => "ingress",
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "egress" => Ok(ProxyMode::Egress),
            "ingress" => Ok(ProxyMode::Ingress),
            other => Err(format!("unknown mode '{other}' (expected egress or ingress)")),
        }
    }
}

/// Root configuration for the sidecar.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Tunnel side.
    pub mode: ProxyMode,

    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Upstream target, always an `http` URI with an authority.
    pub upstream: Uri,

    /// Header carrying the shared secret between the sidecars.
    pub auth_header: HeaderName,

    /// Crypto word source settings.
    pub secret: SecretConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// A config with defaults for everything except mode and upstream.
    pub fn new(mode: ProxyMode, upstream: Uri) -> Self {
        Self {
            mode,
            listener: ListenerConfig::default(),
            upstream,
            auth_header: HeaderName::from_static("x-auth-token"),
            secret: SecretConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address.
    pub bind_address: SocketAddr,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 18080)),
            max_connections: 10_000,
        }
    }
}

/// Where the crypto word comes from.
#[derive(Debug, Clone)]
pub struct SecretConfig {
    /// Evaluate the word through flagd (true) or use the static default.
    pub use_flagd: bool,

    /// Static word, and the fallback default in flagd mode. "" = transparent.
    pub default_word: String,

    /// Feature-flag key holding the word.
    pub flag_key: String,

    /// flagd endpoint.
    pub flagd_host: String,
    pub flagd_port: u16,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            use_flagd: true,
            default_word: String::new(),
            flag_key: "cryptoWord".to_string(),
            flagd_host: "flagd".to_string(),
            flagd_port: 8013,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    /// Prometheus exporter bind address; None disables the exporter.
    pub metrics_address: Option<SocketAddr>,
}

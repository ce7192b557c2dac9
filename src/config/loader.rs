//! Configuration loading from the environment.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::header::HeaderName;
use axum::http::Uri;

use crate::config::schema::{ProxyConfig, ProxyMode};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    MissingUpstream,
    InvalidUpstream(String),
    InvalidMode(String),
    InvalidListenAddr(String),
    InvalidHeaderName(String),
    InvalidMetricsAddr(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingUpstream => write!(f, "UPSTREAM_URL required"),
            ConfigError::InvalidUpstream(e) => write!(f, "invalid UPSTREAM_URL: {}", e),
            ConfigError::InvalidMode(e) => write!(f, "invalid MODE: {}", e),
            ConfigError::InvalidListenAddr(e) => write!(f, "invalid LISTEN_ADDR: {}", e),
            ConfigError::InvalidHeaderName(e) => write!(f, "invalid HEADER_NAME: {}", e),
            ConfigError::InvalidMetricsAddr(e) => write!(f, "invalid METRICS_ADDR: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate the configuration from environment variables.
pub fn from_env() -> Result<ProxyConfig, ConfigError> {
    let mode = env_str("MODE", "egress")
        .parse::<ProxyMode>()
        .map_err(ConfigError::InvalidMode)?;

    let raw_upstream = env_str("UPSTREAM_URL", "");
    if raw_upstream.is_empty() {
        return Err(ConfigError::MissingUpstream);
    }
    let upstream = parse_upstream(&raw_upstream)?;

    let mut config = ProxyConfig::new(mode, upstream);

    config.listener.bind_address = parse_listen_addr(&env_str("LISTEN_ADDR", ":18080"))?;
    if let Ok(raw) = env::var("MAX_CONNECTIONS") {
        if let Ok(n) = raw.trim().parse::<usize>() {
            config.listener.max_connections = n;
        }
    }

    config.auth_header = HeaderName::from_str(&env_str("HEADER_NAME", "X-Auth-Token"))
        .map_err(|e| ConfigError::InvalidHeaderName(e.to_string()))?;

    config.secret.use_flagd = env_bool("CRYPTO_USE_FLAGD", true);
    config.secret.default_word = env_str("CRYPTO_DEFAULT_WORD", "");
    config.secret.flag_key = env_str("FLAG_KEY", "cryptoWord");
    config.secret.flagd_host = env_str("FLAGD_HOST", "flagd");
    config.secret.flagd_port = env_u16("FLAGD_PORT", 8013);

    let metrics_addr = env_str("METRICS_ADDR", "");
    if !metrics_addr.is_empty() {
        config.observability.metrics_address = Some(
            metrics_addr
                .parse()
                .map_err(|_| ConfigError::InvalidMetricsAddr(metrics_addr.clone()))?,
        );
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a listen address, accepting the `:PORT` shorthand for all
/// interfaces.
pub(crate) fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let full = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };
    full.parse()
        .map_err(|_| ConfigError::InvalidListenAddr(raw.to_string()))
}

/// Parse the upstream target, prepending `http://` when no scheme is given.
pub(crate) fn parse_upstream(raw: &str) -> Result<Uri, ConfigError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    with_scheme
        .parse::<Uri>()
        .map_err(|e| ConfigError::InvalidUpstream(format!("{raw}: {e}")))
}

fn env_str(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    let v = env_str(key, "").to_ascii_lowercase();
    if v.is_empty() {
        return default;
    }
    matches!(v.as_str(), "1" | "true" | "yes" | "on")
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_str(key, "").parse().unwrap_or(default)
}

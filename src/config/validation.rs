//! Configuration validation logic.

use crate::config::schema::ProxyConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation error: {}", self.0)
    }
}

/// Validate a ProxyConfig for semantic correctness.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // The upstream dial is always cleartext; an https URL would silently
    // downgrade, so reject it outright.
    match config.upstream.scheme_str() {
        Some("http") => {}
        Some(other) => errors.push(ValidationError(format!(
            "upstream scheme '{other}' not supported: the upstream is dialed as cleartext http"
        ))),
        None => errors.push(ValidationError(
            "upstream URL must include a scheme".to_string(),
        )),
    }

    if config.upstream.authority().is_none() {
        errors.push(ValidationError(
            "upstream URL must include a host".to_string(),
        ));
    }

    if config.secret.flag_key.is_empty() {
        errors.push(ValidationError("flag key must not be empty".to_string()));
    }

    if config.secret.use_flagd && config.secret.flagd_host.is_empty() {
        errors.push(ValidationError(
            "flagd host must not be empty in dynamic mode".to_string(),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError(
            "listener.max_connections must be > 0".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ProxyConfig, ProxyMode};

    fn base_config() -> ProxyConfig {
        ProxyConfig::new(ProxyMode::Egress, "http://backend:8080".parse().unwrap())
    }

    #[test]
    fn default_shape_is_valid() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn https_upstream_rejected() {
        let mut config = base_config();
        config.upstream = "https://backend:8080".parse().unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].0.contains("cleartext"));
    }

    #[test]
    fn empty_flag_key_rejected() {
        let mut config = base_config();
        config.secret.flag_key.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_connection_cap_rejected() {
        let mut config = base_config();
        config.listener.max_connections = 0;
        assert!(validate_config(&config).is_err());
    }
}

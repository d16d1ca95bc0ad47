//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (workers > 0, timeouts > 0, addresses parse)
//! - Check the static root exists and the canonical origin is an absolute
//!   http(s) URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//!   (apart from checking the static root on disk)
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("listener.workers must be at least 1")]
    NoWorkers,

    #[error("site.public_root {0:?} is not a directory")]
    MissingPublicRoot(PathBuf),

    #[error("site.canonical_origin {value:?} is invalid: {reason}")]
    InvalidCanonicalOrigin { value: String, reason: String },

    #[error("timeouts.request_secs must be greater than 0")]
    ZeroRequestTimeout,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.workers == 0 {
        errors.push(ValidationError::NoWorkers);
    }

    if !config.site.public_root.is_dir() {
        errors.push(ValidationError::MissingPublicRoot(
            config.site.public_root.clone(),
        ));
    }
    if let Some(origin) = &config.site.canonical_origin {
        if let Err(reason) = check_origin(origin) {
            errors.push(ValidationError::InvalidCanonicalOrigin {
                value: origin.clone(),
                reason,
            });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_origin(origin: &str) -> Result<(), String> {
    let url = Url::parse(origin).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {other:?}")),
    }
    if url.host().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> (tempfile::TempDir, ServerConfig) {
        let root = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.site.public_root = root.path().to_path_buf();
        (root, config)
    }

    #[test]
    fn test_default_with_existing_root_is_valid() {
        let (_root, config) = valid();
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let (_root, mut config) = valid();
        config.listener.bind_address = "not-an-address".into();
        config.listener.workers = 0;
        config.timeouts.request_secs = 0;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nope".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("not-an-address".into()),
                ValidationError::NoWorkers,
                ValidationError::ZeroRequestTimeout,
                ValidationError::InvalidMetricsAddress("nope".into()),
            ]
        );
    }

    #[test]
    fn test_canonical_origin_checks() {
        let (_root, mut config) = valid();

        config.site.canonical_origin = Some("https://example.com".into());
        assert!(validate_config(&config).is_ok());

        config.site.canonical_origin = Some("/relative".into());
        assert!(validate_config(&config).is_err());

        config.site.canonical_origin = Some("ftp://example.com".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidCanonicalOrigin { reason, .. } if reason.contains("ftp")
        ));
    }

    #[test]
    fn test_missing_root() {
        let mut config = ServerConfig::default();
        config.site.public_root = PathBuf::from("/no/such/public/root");
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MissingPublicRoot(config.site.public_root.clone())])
        );
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (stagger and poll intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SupervisorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::SupervisorConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("worker.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("pool.exec must not be empty")]
    EmptyExec,

    #[error("timing.{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("worker.drain_timeout_secs must be greater than zero")]
    ZeroDrainTimeout,
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &SupervisorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.worker.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.worker.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config
        .pool
        .exec
        .as_ref()
        .is_some_and(|exec| exec.as_os_str().is_empty())
    {
        errors.push(ValidationError::EmptyExec);
    }

    if config.timing.fork_stagger_ms == 0 {
        errors.push(ValidationError::ZeroInterval("fork_stagger_ms"));
    }
    if config.timing.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval("poll_interval_ms"));
    }

    if config.worker.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDrainTimeout);
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
    use std::path::PathBuf;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&SupervisorConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_error() {
        let mut config = SupervisorConfig::default();
        config.worker.bind_address = "localhost".into();
        config.pool.exec = Some(PathBuf::new());
        config.timing.fork_stagger_ms = 0;
        config.timing.poll_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("localhost".into()),
                ValidationError::EmptyExec,
                ValidationError::ZeroInterval("fork_stagger_ms"),
                ValidationError::ZeroInterval("poll_interval_ms"),
            ]
        );
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = SupervisorConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::MetricsAddress("nope".into())])
        );
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the request timeout outlasts the connect and call budgets
//! - Check the route prefix is mountable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("backend.address must not be empty")]
    EmptyBackendAddress,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("timeouts.request_secs ({request_ms}ms) must exceed connect_ms + call_ms ({budget_ms}ms)")]
    RequestTimeoutTooShort { request_ms: u64, budget_ms: u64 },

    #[error("routes.prefix `{0}` must be empty or start with `/` and not end with `/`")]
    RoutePrefix(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.backend.address.trim().is_empty() {
        errors.push(ValidationError::EmptyBackendAddress);
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_ms"));
    }
    if config.timeouts.call_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("call_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    } else {
        // The backend budgets must expire before the whole request does.
        let request_ms = config.timeouts.request_secs.saturating_mul(1_000);
        let budget_ms = config.timeouts.connect_ms.saturating_add(config.timeouts.call_ms);
        if request_ms <= budget_ms {
            errors.push(ValidationError::RequestTimeoutTooShort { request_ms, budget_ms });
        }
    }

    let prefix = &config.routes.prefix;
    if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
        errors.push(ValidationError::RoutePrefix(prefix.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the log filter and metrics address parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: &ReceiverConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ReceiverConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("observability.log_level '{value}' is not a valid filter: {reason}")]
    LogLevel { value: String, reason: String },

    #[error("observability.metrics_address '{value}' is not a socket address")]
    MetricsAddress { value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ReceiverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let observability = &config.observability;

    if let Err(e) = EnvFilter::try_new(&observability.log_level) {
        errors.push(ValidationError::LogLevel {
            value: observability.log_level.clone(),
            reason: e.to_string(),
        });
    }

    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress {
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

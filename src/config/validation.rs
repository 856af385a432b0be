//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thread counts, table limits, timeouts)
//! - Validate log level and metrics address
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;
use tracing::Level;

use crate::config::schema::BridgeConfig;

const MAX_WORKER_THREADS: usize = 1024;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let runtime = &config.runtime;
    if runtime.worker_threads == 0 || runtime.worker_threads > MAX_WORKER_THREADS {
        errors.push(ValidationError::new(
            "runtime.worker_threads",
            format!("must be between 1 and {}", MAX_WORKER_THREADS),
        ));
    }
    if runtime.thread_name.trim().is_empty() {
        errors.push(ValidationError::new("runtime.thread_name", "must not be empty"));
    }
    if runtime.shutdown_timeout_ms == 0 {
        errors.push(ValidationError::new("runtime.shutdown_timeout_ms", "must be positive"));
    }

    // One id / handle value (0) is reserved
    let max_slots = u32::MAX as usize - 1;
    if config.sessions.max_sessions == 0 || config.sessions.max_sessions > max_slots {
        errors.push(ValidationError::new(
            "sessions.max_sessions",
            format!("must be between 1 and {}", max_slots),
        ));
    }
    if config.buffers.max_buffers == 0 || config.buffers.max_buffers > max_slots {
        errors.push(ValidationError::new(
            "buffers.max_buffers",
            format!("must be between 1 and {}", max_slots),
        ));
    }

    let observability = &config.observability;
    if Level::from_str(&observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

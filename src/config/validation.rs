//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that the naming conventions can produce routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MinirestConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MinirestConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be a single non-empty path segment, got {value:?}")]
    InvalidSegment { field: &'static str, value: String },

    #[error("project.src_dir and project.out_dir must not contain one another")]
    OverlappingDirs,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &MinirestConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "server.request_timeout_secs" });
    }
    if config.server.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "server.max_body_size" });
    }
    if config.engine.max_call_levels == 0 {
        errors.push(ValidationError::Zero { field: "engine.max_call_levels" });
    }

    let segments = [
        ("project.routes_dir", &config.project.routes_dir),
        ("project.index_name", &config.project.index_name),
        ("project.extension", &config.project.extension),
    ];
    for (field, value) in segments {
        if !is_segment(value) {
            errors.push(ValidationError::InvalidSegment { field, value: value.clone() });
        }
    }

    let src = config.project.src_path();
    let out = config.project.out_path();
    if src.starts_with(&out) || out.starts_with(&src) {
        errors.push(ValidationError::OverlappingDirs);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_segment(value: &str) -> bool {
    !value.is_empty() && !value.contains(['/', '\\']) && value != "." && value != ".."
}

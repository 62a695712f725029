//! Error taxonomy for the RIS Lab engine.
//!
//! Configuration problems are reported with every offending field named in
//! one message where possible. Numeric edge cases (near-zero power, obliquity
//! roundoff) are handled in place and never surface here.

use ris_geometry::GeometryError;
use thiserror::Error;

use crate::reference::ReferenceError;

/// Errors raised by configuration resolution, synthesis, and scoring.
#[derive(Debug, Error)]
pub enum RisError {
    #[error("RIS Lab config missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid configuration: {field} {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidFields(Vec<String>),

    #[error("Unsupported {kind}: '{value}' (expected one of: {expected})")]
    Unsupported {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{mode} control requires {requirement}")]
    MissingControlParam {
        mode: &'static str,
        requirement: &'static str,
    },

    #[error("custom phase shape {found:?} does not match {expected:?}")]
    ShapeMismatch {
        found: (usize, usize),
        expected: (usize, usize),
    },

    #[error("quantization_bits must be one of {{0, 1, 2}} (got {0})")]
    QuantizationBits(i64),

    #[error("theta_deg length does not match {name} length ({theta} vs {values})")]
    LengthMismatch {
        name: &'static str,
        theta: usize,
        values: usize,
    },

    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl RisError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        RisError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

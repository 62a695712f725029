//! Errors raised while building frames, grids, and layouts.

use thiserror::Error;

/// Errors during geometry construction.
///
/// All of these are raised before any element array is allocated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{name} must be a non-zero vector")]
    ZeroVector { name: &'static str },

    #[error("nx and ny must be positive (got nx={nx}, ny={ny})")]
    InvalidCount { nx: i64, ny: i64 },

    #[error("dx and dy must be positive (got dx={dx}, dy={dy})")]
    InvalidPitch { dx: f64, dy: f64 },

    #[error("{field} must be {requirement}")]
    InvalidField { field: String, requirement: &'static str },

    #[error("{0}")]
    MissingField(String),

    #[error("geometry mode must be legacy, size_driven, or spacing_driven (got '{0}')")]
    UnknownMode(String),
}

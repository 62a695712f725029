//! Reference-pattern import for validation.
//!
//! Supported formats:
//! - [`.csv`](csv) — Header row with `theta_deg` and `pattern_db` or `pattern_linear`
//! - [`.npz`](npz) — NumPy archive with arrays of the same names
//! - [`.mat`](mat) — Level-5 MAT variables of the same names (`mat` feature)

pub mod csv;
pub mod mat;
pub mod npz;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pattern::{to_db, Normalization};

/// Keys a reference must provide.
pub const EXPECTED_KEYS: &str = "theta_deg + (pattern_db or pattern_linear)";

/// Errors during reference-pattern loading.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Reference file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Reference missing required keys (found: {}). Expected keys: {}", .found.join(", "), EXPECTED_KEYS)]
    MissingKeys { found: Vec<String> },

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("Unsupported reference format: '{0}' (expected .csv, .npz, or .mat)")]
    UnsupportedFormat(String),

    #[error("Reading {format} references requires the '{feature}' feature ({dependency})")]
    MissingDependency {
        format: &'static str,
        dependency: &'static str,
        feature: &'static str,
    },

    #[error("Failed to decode {format} reference: {message}")]
    Decode { format: &'static str, message: String },

    #[error("Reference theta_deg length does not match pattern length ({theta} vs {values})")]
    LengthMismatch { theta: usize, values: usize },

    #[error("Reference pattern is empty")]
    Empty,
}

/// Unit of the stored reference values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Db,
    Linear,
}

impl PatternKind {
    pub fn key(&self) -> &'static str {
        match self {
            PatternKind::Db => "pattern_db",
            PatternKind::Linear => "pattern_linear",
        }
    }
}

/// A measured or externally simulated pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePattern {
    pub theta_deg: Vec<f64>,
    pub values: Vec<f64>,
    pub kind: PatternKind,
}

impl ReferencePattern {
    /// Check lengths and emptiness.
    pub fn new(theta_deg: Vec<f64>, values: Vec<f64>, kind: PatternKind) -> Result<Self, ReferenceError> {
        if theta_deg.len() != values.len() {
            return Err(ReferenceError::LengthMismatch {
                theta: theta_deg.len(),
                values: values.len(),
            });
        }
        if theta_deg.is_empty() {
            return Err(ReferenceError::Empty);
        }
        Ok(Self { theta_deg, values, kind })
    }

    /// Values as linear power.
    pub fn linear(&self) -> Vec<f64> {
        match self.kind {
            PatternKind::Db => self.values.iter().map(|v| 10.0_f64.powf(v / 10.0)).collect(),
            PatternKind::Linear => self.values.clone(),
        }
    }

    /// Values in dB after re-normalizing the linear pattern.
    pub fn normalized_db(&self, normalization: Normalization) -> Vec<f64> {
        to_db(&normalization.apply(&self.linear()))
    }
}

/// Pick `pattern_db` over `pattern_linear` from the available keys, or fail
/// listing what was found.
pub(crate) fn select_keys<S: AsRef<str>>(found: &[S]) -> Result<PatternKind, ReferenceError> {
    let has = |key: &str| found.iter().any(|f| f.as_ref() == key);
    let kind = if has("pattern_db") {
        Some(PatternKind::Db)
    } else if has("pattern_linear") {
        Some(PatternKind::Linear)
    } else {
        None
    };
    match kind {
        Some(kind) if has("theta_deg") => Ok(kind),
        _ => Err(ReferenceError::MissingKeys {
            found: found.iter().map(|f| f.as_ref().to_string()).collect(),
        }),
    }
}

/// Load a reference pattern, dispatching on the file extension.
pub fn load_reference(path: &Path) -> Result<ReferencePattern, ReferenceError> {
    if !path.exists() {
        return Err(ReferenceError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let reference = match ext.as_str() {
        "csv" => csv::parse_csv(&std::fs::read_to_string(path)?)?,
        "npz" => npz::load_npz(path)?,
        "mat" => mat::load_mat(path)?,
        other => return Err(ReferenceError::UnsupportedFormat(format!(".{}", other))),
    };
    log::info!(
        "loaded {} reference samples ({}) from {}",
        reference.theta_deg.len(),
        reference.kind.key(),
        path.display()
    );
    Ok(reference)
}

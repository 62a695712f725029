//! Reradiated-power patterns across a receive-angle sweep.
//!
//! A pattern is produced by a [`PatternModel`] evaluated at a list of receive
//! angles, measured in the panel's `(w, u)` plane from the normal. Two models
//! are provided:
//!
//! - [`near_field::NearFieldModel`] — Element-wise link budget with exact
//!   transmitter/receiver ranges and a cosine-taper element gain.
//! - [`array_factor::ArrayFactorModel`] — Idealized far-field array factor,
//!   useful as a quick steering check.
//!
//! Post-processing ([`Normalization`], dB conversion) is applied to the linear
//! output, never inside a model.

pub mod array_factor;
pub mod metrics;
pub mod near_field;

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use ris_geometry::ElementGrid;
use serde::{Deserialize, Serialize};

use crate::error::RisError;
use crate::units::linear_to_db;

/// A model that maps a phase map to reradiated power at each receive angle.
///
/// Implementations must evaluate every angle independently and reduce over
/// elements in a fixed row-major order, so results do not depend on how the
/// sweep is scheduled.
pub trait PatternModel {
    /// Linear power at each angle in `theta_deg`.
    fn evaluate(
        &self,
        grid: &ElementGrid,
        phase: &Array2<f64>,
        theta_deg: &[f64],
    ) -> Result<Vec<f64>, RisError>;

    /// Human-readable name of the model.
    fn name(&self) -> &str;
}

/// Which [`PatternModel`] a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternModelKind {
    #[default]
    NearField,
    ArrayFactor,
}

impl FromStr for PatternModelKind {
    type Err = RisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "near_field" => Ok(PatternModelKind::NearField),
            "array_factor" => Ok(PatternModelKind::ArrayFactor),
            other => Err(RisError::Unsupported {
                kind: "pattern model",
                value: other.to_string(),
                expected: "near_field, array_factor",
            }),
        }
    }
}

/// Rescaling applied to a linear pattern before dB conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// Divide by the maximum so the peak sits at 0 dB.
    #[default]
    #[serde(rename = "peak_0db")]
    Peak0Db,
    /// Divide by the mean so average power is unity.
    #[serde(rename = "unit_power")]
    UnitPower,
    /// Leave the pattern unscaled.
    #[serde(rename = "none")]
    None,
}

impl FromStr for Normalization {
    type Err = RisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peak_0db" => Ok(Normalization::Peak0Db),
            "unit_power" => Ok(Normalization::UnitPower),
            "none" => Ok(Normalization::None),
            other => Err(RisError::Unsupported {
                kind: "normalization mode",
                value: other.to_string(),
                expected: "peak_0db, unit_power, none",
            }),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Normalization::Peak0Db => "peak_0db",
            Normalization::UnitPower => "unit_power",
            Normalization::None => "none",
        })
    }
}

impl Normalization {
    /// Apply to a linear pattern. A zero peak or mean leaves the input as is.
    pub fn apply(&self, linear: &[f64]) -> Vec<f64> {
        let scale = match self {
            Normalization::Peak0Db => linear.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Normalization::UnitPower if !linear.is_empty() => {
                linear.iter().sum::<f64>() / linear.len() as f64
            }
            _ => return linear.to_vec(),
        };
        if scale > 0.0 {
            linear.iter().map(|v| v / scale).collect()
        } else {
            linear.to_vec()
        }
    }
}

/// Largest number of angles a sweep may produce.
pub const MAX_SWEEP_SAMPLES: usize = 1_000_000;

/// Receive-angle sweep `start..=stop` in steps of `step` (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for SweepSpec {
    fn default() -> Self {
        Self {
            start: -90.0,
            stop: 90.0,
            step: 2.0,
        }
    }
}

impl SweepSpec {
    /// Check that the sweep describes at least one angle.
    pub fn validate(&self) -> Result<(), RisError> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(RisError::InvalidSweep(format!(
                "step must be positive (got {})",
                self.step
            )));
        }
        if !(self.stop >= self.start) {
            return Err(RisError::InvalidSweep(format!(
                "stop ({}) must not be below start ({})",
                self.stop, self.start
            )));
        }
        let count = self.sample_count();
        if !(count <= MAX_SWEEP_SAMPLES as f64) {
            return Err(RisError::InvalidSweep(format!(
                "{} samples exceeds the limit of {}",
                count, MAX_SWEEP_SAMPLES
            )));
        }
        Ok(())
    }

    fn sample_count(&self) -> f64 {
        // Half-step slack on the upper bound keeps `stop` despite roundoff.
        let upper = self.stop + 0.5 * self.step;
        ((upper - self.start) / self.step).ceil().max(0.0)
    }

    /// Sweep angles. `stop` is included when it lies on the step grid.
    pub fn angles(&self) -> Result<Vec<f64>, RisError> {
        self.validate()?;
        let count = self.sample_count() as usize;
        Ok((0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect())
    }
}

/// A normalized pattern: angles with linear and dB power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSample {
    pub theta_deg: Vec<f64>,
    pub linear: Vec<f64>,
    pub db: Vec<f64>,
}

impl PatternSample {
    /// Normalize `linear` and convert to dB.
    pub fn from_linear(
        theta_deg: Vec<f64>,
        linear: &[f64],
        normalization: Normalization,
    ) -> Result<Self, RisError> {
        check_lengths(&theta_deg, linear, "pattern_linear")?;
        let linear = normalization.apply(linear);
        let db = to_db(&linear);
        Ok(Self { theta_deg, linear, db })
    }

    pub fn len(&self) -> usize {
        self.theta_deg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theta_deg.is_empty()
    }
}

/// `10·log10(x + 1e-12)` element-wise.
pub fn to_db(linear: &[f64]) -> Vec<f64> {
    linear.iter().map(|&v| linear_to_db(v)).collect()
}

/// Fail unless `theta_deg` and `values` have equal length.
pub fn check_lengths(theta_deg: &[f64], values: &[f64], name: &'static str) -> Result<(), RisError> {
    if theta_deg.len() != values.len() {
        return Err(RisError::LengthMismatch {
            name,
            theta: theta_deg.len(),
            values: values.len(),
        });
    }
    Ok(())
}

/// Evaluate `f` at every angle, across threads when the `parallel` feature is on.
///
/// Output order always matches `theta_deg`.
pub(crate) fn map_angles<F>(theta_deg: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        theta_deg.par_iter().map(|&t| f(t)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        theta_deg.iter().map(|&t| f(t)).collect()
    }
}

/// Fail unless the phase map matches the grid's `(ny, nx)` shape.
pub(crate) fn check_phase_shape(grid: &ElementGrid, phase: &Array2<f64>) -> Result<(), RisError> {
    if phase.dim() != grid.shape() {
        return Err(RisError::ShapeMismatch {
            found: phase.dim(),
            expected: grid.shape(),
        });
    }
    Ok(())
}

/// Index of the first maximum, matching `argmax` semantics.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if !(v > b) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

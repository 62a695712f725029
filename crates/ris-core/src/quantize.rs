//! Phase quantization to a finite alphabet.
//!
//! For `b` bits the alphabet is $\{0, \Delta, 2\Delta, \dots\}$ with
//! $\Delta = 2\pi / 2^b$. Each wrapped phase maps to the level with the
//! smallest absolute (non-circular) distance; exact ties go to the lower
//! level.

use std::f64::consts::TAU;

use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::RisError;

/// Continuous phase or a 1/2-bit phase shifter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantizationPolicy {
    #[default]
    Continuous,
    OneBit,
    TwoBit,
}

impl QuantizationPolicy {
    /// `None` and `0` are continuous; `1` and `2` select an alphabet.
    pub fn from_bits(bits: Option<i64>) -> Result<Self, RisError> {
        match bits {
            None | Some(0) => Ok(QuantizationPolicy::Continuous),
            Some(1) => Ok(QuantizationPolicy::OneBit),
            Some(2) => Ok(QuantizationPolicy::TwoBit),
            Some(other) => Err(RisError::QuantizationBits(other)),
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            QuantizationPolicy::Continuous => 0,
            QuantizationPolicy::OneBit => 1,
            QuantizationPolicy::TwoBit => 2,
        }
    }

    /// Phase levels in ascending order; empty when continuous.
    pub fn levels(&self) -> Vec<f64> {
        match self {
            QuantizationPolicy::Continuous => Vec::new(),
            _ => {
                let n = 1usize << self.bits();
                let step = TAU / n as f64;
                (0..n).map(|i| i as f64 * step).collect()
            }
        }
    }

    /// Quantize one phase value.
    pub fn quantize_value(&self, phase: f64) -> f64 {
        let levels = self.levels();
        if levels.is_empty() {
            return phase;
        }
        let wrapped = wrap_phase(phase);
        let mut best = levels[0];
        let mut best_dist = (wrapped - best).abs();
        for &level in &levels[1..] {
            let dist = (wrapped - level).abs();
            // Strict comparison keeps the lower level on ties.
            if dist < best_dist {
                best = level;
                best_dist = dist;
            }
        }
        best
    }

    pub fn apply<D: Dimension>(&self, phase: &Array<f64, D>) -> Array<f64, D> {
        match self {
            QuantizationPolicy::Continuous => phase.clone(),
            _ => phase.mapv(|p| self.quantize_value(p)),
        }
    }
}

/// Wrap into `[0, 2π)`.
pub fn wrap_phase(phase: f64) -> f64 {
    let w = phase.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if w >= TAU {
        0.0
    } else {
        w
    }
}

/// Quantize a phase array to `bits` bits (`None`/`0` returns a copy).
pub fn quantize_phase<D: Dimension>(
    phase: &Array<f64, D>,
    bits: Option<i64>,
) -> Result<Array<f64, D>, RisError> {
    let policy = QuantizationPolicy::from_bits(bits)?;
    Ok(policy.apply(phase))
}

//! Scoring a simulated pattern against a reference.
//!
//! Both patterns are sampled at the reference angles. Three errors are
//! computed and each must stay within its own maximum for the run to pass:
//!
//! - RMSE (dB) over all angles
//! - absolute difference of the two peak angles (first maximum of each)
//! - absolute difference of the two peak levels (dB)

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::error::RisError;
use crate::pattern::{argmax, check_lengths, to_db};
use crate::reference::ReferencePattern;

/// Maximum allowed errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub rmse_db_max: f64,
    pub peak_angle_err_deg_max: f64,
    pub peak_db_err_max: f64,
}

impl From<&ValidationConfig> for ValidationThresholds {
    fn from(cfg: &ValidationConfig) -> Self {
        Self {
            rmse_db_max: cfg.rmse_db_max,
            peak_angle_err_deg_max: cfg.peak_angle_err_deg_max,
            peak_db_err_max: cfg.peak_db_err_max,
        }
    }
}

/// Outcome of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rmse_db: f64,
    pub peak_angle_error_deg: f64,
    pub peak_db_error: f64,
    pub sim_peak_angle_deg: f64,
    pub ref_peak_angle_deg: f64,
    pub thresholds: ValidationThresholds,
    pub passed: bool,
}

/// Compare two dB patterns sampled at the same `theta_deg`.
pub fn validate_pattern(
    theta_deg: &[f64],
    sim_db: &[f64],
    ref_db: &[f64],
    thresholds: ValidationThresholds,
) -> Result<ValidationReport, RisError> {
    check_lengths(theta_deg, sim_db, "simulated pattern")?;
    check_lengths(theta_deg, ref_db, "reference pattern")?;
    let (sim_peak, ref_peak) = match (argmax(sim_db), argmax(ref_db)) {
        (Some(s), Some(r)) => (s, r),
        _ => return Err(RisError::invalid("theta_deg", "must not be empty")),
    };

    let mse = sim_db
        .iter()
        .zip(ref_db)
        .map(|(s, r)| (s - r).powi(2))
        .sum::<f64>()
        / theta_deg.len() as f64;
    let rmse_db = mse.sqrt();
    let peak_angle_error_deg = (theta_deg[sim_peak] - theta_deg[ref_peak]).abs();
    let peak_db_error = (sim_db[sim_peak] - ref_db[ref_peak]).abs();

    let passed = rmse_db <= thresholds.rmse_db_max
        && peak_angle_error_deg <= thresholds.peak_angle_err_deg_max
        && peak_db_error <= thresholds.peak_db_err_max;

    Ok(ValidationReport {
        rmse_db,
        peak_angle_error_deg,
        peak_db_error,
        sim_peak_angle_deg: theta_deg[sim_peak],
        ref_peak_angle_deg: theta_deg[ref_peak],
        thresholds,
        passed,
    })
}

/// Normalize a simulated linear pattern and a reference the same way, then
/// compare them.
///
/// `sim_linear` must have been evaluated at `reference.theta_deg`.
pub fn validate_against_reference(
    reference: &ReferencePattern,
    sim_linear: &[f64],
    config: &ValidationConfig,
) -> Result<ValidationReport, RisError> {
    let sim_db = to_db(&config.normalization.apply(sim_linear));
    let ref_db = reference.normalized_db(config.normalization);
    let report = validate_pattern(&reference.theta_deg, &sim_db, &ref_db, config.into())?;
    log::info!(
        "validation rmse={:.3} dB peak_angle_err={:.2} deg peak_db_err={:.3} passed={}",
        report.rmse_db,
        report.peak_angle_error_deg,
        report.peak_db_error,
        report.passed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::PatternKind;

    fn thresholds() -> ValidationThresholds {
        (&ValidationConfig::default()).into()
    }

    #[test]
    fn test_identical_patterns_pass() {
        let theta = [-20.0, -10.0, 0.0, 10.0, 20.0];
        let db = [-12.0, -4.0, 0.0, -5.0, -15.0];
        let r = validate_pattern(&theta, &db, &db, thresholds()).unwrap();
        assert!(r.rmse_db.abs() < 1e-12);
        assert_eq!(r.peak_angle_error_deg, 0.0);
        assert_eq!(r.peak_db_error, 0.0);
        assert!(r.passed);
    }

    #[test]
    fn test_shifted_peak_fails() {
        let theta = [-20.0, -10.0, 0.0, 10.0, 20.0];
        let sim = [-12.0, -4.0, 0.0, -5.0, -15.0];
        let mut reference = sim;
        reference[3] = 0.5;
        let r = validate_pattern(&theta, &sim, &reference, thresholds()).unwrap();
        assert_eq!(r.ref_peak_angle_deg, 10.0);
        assert_eq!(r.peak_angle_error_deg, 10.0);
        assert!(!r.passed);
    }

    #[test]
    fn test_each_threshold_is_independent() {
        let theta = [0.0, 1.0];
        let sim = [0.0, -10.0];
        let reference = [0.0, -13.0];
        // rmse = 3/sqrt(2) ≈ 2.12 exceeds 2.0 while both peak errors are zero.
        let r = validate_pattern(&theta, &sim, &reference, thresholds()).unwrap();
        assert_eq!(r.peak_angle_error_deg, 0.0);
        assert_eq!(r.peak_db_error, 0.0);
        assert!(!r.passed);
    }

    #[test]
    fn test_reference_renormalized() {
        let reference = ReferencePattern::new(
            vec![-10.0, 0.0, 10.0],
            vec![2.0, 8.0, 4.0],
            PatternKind::Linear,
        )
        .unwrap();
        let r = validate_against_reference(&reference, &[0.25, 1.0, 0.5], &ValidationConfig::default())
            .unwrap();
        assert!(r.rmse_db < 1e-9);
        assert!(r.passed);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(validate_pattern(&[0.0, 1.0], &[0.0], &[0.0, 1.0], thresholds()).is_err());
    }
}

//! Scalar summaries of a dB pattern.

use serde::{Deserialize, Serialize};

use crate::error::RisError;
use crate::pattern::{argmax, check_lengths};

/// Peak, beamwidth, and sidelobe summary of one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMetrics {
    pub peak_index: usize,
    pub peak_angle_deg: f64,
    pub peak_db: f64,
    /// Angular span of samples within 3 dB of the peak.
    pub beamwidth_3db_deg: f64,
    /// Strongest sample outside the main lobe.
    pub sidelobe_peak_db: Option<f64>,
    /// `peak_db - sidelobe_peak_db`.
    pub sidelobe_level_db: Option<f64>,
}

/// Summarize a dB pattern sampled at `theta_deg`.
///
/// The main lobe runs outward from the (first) peak until the pattern stops
/// falling on each side.
pub fn compute_metrics(theta_deg: &[f64], pattern_db: &[f64]) -> Result<PatternMetrics, RisError> {
    check_lengths(theta_deg, pattern_db, "pattern_db")?;
    let peak_index = argmax(pattern_db)
        .ok_or_else(|| RisError::invalid("pattern_db", "must not be empty"))?;
    let peak_db = pattern_db[peak_index];

    let threshold = peak_db - 3.0;
    let within: Vec<usize> = (0..pattern_db.len())
        .filter(|&i| pattern_db[i] >= threshold)
        .collect();
    let beamwidth_3db_deg = match (within.first(), within.last()) {
        (Some(&lo), Some(&hi)) => (theta_deg[hi] - theta_deg[lo]).abs(),
        _ => 0.0,
    };

    let mut left = peak_index;
    while left > 0 && pattern_db[left - 1] <= pattern_db[left] {
        left -= 1;
    }
    let mut right = peak_index;
    while right + 1 < pattern_db.len() && pattern_db[right + 1] <= pattern_db[right] {
        right += 1;
    }

    let sidelobe_peak_db = pattern_db[..left]
        .iter()
        .chain(pattern_db[right + 1..].iter())
        .copied()
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

    Ok(PatternMetrics {
        peak_index,
        peak_angle_deg: theta_deg[peak_index],
        peak_db,
        beamwidth_3db_deg,
        sidelobe_peak_db,
        sidelobe_level_db: sidelobe_peak_db.map(|s| peak_db - s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theta() -> Vec<f64> {
        (-4..=4).map(|i| i as f64 * 10.0).collect()
    }

    #[test]
    fn test_peak_beamwidth_sidelobe() {
        let db = [-20.0, -10.0, -25.0, -3.0, 0.0, -3.0, -30.0, -12.0, -40.0];
        let m = compute_metrics(&theta(), &db).unwrap();
        assert_eq!(m.peak_index, 4);
        assert_eq!(m.peak_angle_deg, 0.0);
        assert!((m.beamwidth_3db_deg - 20.0).abs() < 1e-12);
        assert_eq!(m.sidelobe_peak_db, Some(-10.0));
        assert_eq!(m.sidelobe_level_db, Some(10.0));
    }

    #[test]
    fn test_monotone_pattern_has_no_sidelobe() {
        let db = [-8.0, -7.0, -6.0, -5.0, -4.0, -3.0, -2.0, -1.0, 0.0];
        let m = compute_metrics(&theta(), &db).unwrap();
        assert_eq!(m.peak_angle_deg, 40.0);
        assert_eq!(m.sidelobe_peak_db, None);
        assert_eq!(m.sidelobe_level_db, None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(compute_metrics(&[], &[]).is_err());
        assert!(compute_metrics(&[0.0, 1.0], &[0.0]).is_err());
    }
}

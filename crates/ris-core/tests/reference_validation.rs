//! Reference import and validation against a simulated pattern.
//!
//! - CSV and NPZ references load to the same pattern
//! - A reference taken from the simulation itself passes
//! - Moving the reference peak fails on peak-angle error

use std::fs::File;

use ndarray::Array1;
use ndarray_npy::NpzWriter;

use ris_core::config::{parse_config, resolve_config, ConfigFormat};
use ris_core::reference::{load_reference, PatternKind, ReferenceError};
use ris_core::validation::validate_against_reference;
use ris_core::{ExperimentSetup, RisError};

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

const CONFIG: &str = "
geometry: {nx: 10, ny: 10, dx: 0.005, dy: 0.005}
control:
  mode: reflectarray
  params: {azimuth_deg: 0.0, elevation_deg: 70.0}
pattern_mode:
  rx_sweep_deg: {start: -60.0, stop: 60.0, step: 4.0}
";

/// Simulated (theta, linear) over the configured sweep.
fn simulate() -> (ExperimentSetup, Vec<f64>, Vec<f64>) {
    let cfg = resolve_config(parse_config(CONFIG, ConfigFormat::Yaml).unwrap()).unwrap();
    let setup = ExperimentSetup::from_config(&cfg).unwrap();
    let phase = setup.phase_map().unwrap();
    let pattern = setup.pattern(&phase).unwrap();
    (setup, pattern.theta_deg, pattern.linear)
}

fn write_csv(path: &std::path::Path, key: &str, theta: &[f64], values: &[f64]) {
    let mut content = format!("# reference\ntheta_deg,{}\n", key);
    for (t, v) in theta.iter().zip(values) {
        content.push_str(&format!("{},{}\n", t, v));
    }
    std::fs::write(path, content).unwrap();
}

// ─────────────────────────────────────────────────────────────
// Import
// ─────────────────────────────────────────────────────────────

#[test]
fn test_csv_and_npz_agree() {
    let dir = tempfile::tempdir().unwrap();
    let theta = vec![-10.0, 0.0, 10.0];
    let linear = vec![0.1, 1.0, 0.3];

    let csv_path = dir.path().join("ref.csv");
    std::fs::write(&csv_path, "theta_deg,pattern_linear\n-10,0.1\n0,1.0\n10,0.3\n").unwrap();

    let npz_path = dir.path().join("ref.npz");
    let mut npz = NpzWriter::new(File::create(&npz_path).unwrap());
    npz.add_array("theta_deg", &Array1::from(theta.clone())).unwrap();
    npz.add_array("pattern_linear", &Array1::from(linear.clone())).unwrap();
    npz.finish().unwrap();

    let a = load_reference(&csv_path).unwrap();
    let b = load_reference(&npz_path).unwrap();
    assert_eq!(a, b);
    assert_eq!(b.kind, PatternKind::Linear);
    assert_eq!(b.theta_deg, theta);
    assert_eq!(b.values, linear);
}

#[test]
fn test_npz_missing_keys_lists_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.npz");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("angle", &Array1::from(vec![0.0, 1.0])).unwrap();
    npz.finish().unwrap();

    let err = load_reference(&path).unwrap_err();
    assert!(matches!(err, ReferenceError::MissingKeys { .. }));
    let msg = err.to_string();
    assert!(msg.contains("angle"), "{}", msg);
    assert!(msg.contains("theta_deg + (pattern_db or pattern_linear)"));
}

// ─────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────

#[test]
fn test_self_reference_passes() {
    let (setup, theta, linear) = simulate();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ref.csv");
    write_csv(&path, "pattern_linear", &theta, &linear);

    let reference = load_reference(&path).unwrap();
    let sim = setup
        .evaluate(&setup.phase_map().unwrap(), &reference.theta_deg)
        .unwrap();
    let report = validate_against_reference(&reference, &sim, &setup.config.validation).unwrap();
    assert!(report.rmse_db < 1e-9, "rmse {}", report.rmse_db);
    assert_eq!(report.peak_angle_error_deg, 0.0);
    assert!(report.peak_db_error < 1e-9);
    assert!(report.passed);
}

#[test]
fn test_moved_reference_peak_fails() {
    let (setup, theta, linear) = simulate();
    let mut db: Vec<f64> = ris_core::pattern::to_db(&linear);
    let far = theta.iter().position(|&t| t == 40.0).unwrap();
    db[far] = 6.0;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ref.csv");
    write_csv(&path, "pattern_db", &theta, &db);

    let reference = load_reference(&path).unwrap();
    let sim = setup
        .evaluate(&setup.phase_map().unwrap(), &reference.theta_deg)
        .unwrap();
    let report = validate_against_reference(&reference, &sim, &setup.config.validation).unwrap();
    assert_eq!(report.ref_peak_angle_deg, 40.0);
    assert!(report.peak_angle_error_deg > setup.config.validation.peak_angle_err_deg_max);
    assert!(!report.passed);
}

#[test]
fn test_length_mismatch_is_reported() {
    let (setup, _, _) = simulate();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ref.csv");
    write_csv(&path, "pattern_db", &[0.0, 4.0, 8.0], &[0.0, -1.0, -2.0]);
    let reference = load_reference(&path).unwrap();
    let err = validate_against_reference(&reference, &[1.0, 0.5], &setup.config.validation)
        .unwrap_err();
    assert!(matches!(err, RisError::LengthMismatch { .. }));
}

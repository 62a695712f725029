//! NumPy `.npz` reference patterns.

use std::fs::File;
use std::path::Path;

use ndarray::ArrayD;
use ndarray_npy::NpzReader;

use super::{select_keys, ReferenceError, ReferencePattern};

fn decode(e: impl std::fmt::Display) -> ReferenceError {
    ReferenceError::Decode {
        format: "NPZ",
        message: e.to_string(),
    }
}

/// Load `theta_deg` and a pattern array from an `.npz` archive.
///
/// Entry names are matched with or without the `.npy` suffix NumPy adds.
pub fn load_npz(path: &Path) -> Result<ReferencePattern, ReferenceError> {
    let mut npz = NpzReader::new(File::open(path)?).map_err(decode)?;
    let entries = npz.names().map_err(decode)?;
    let keys: Vec<String> = entries
        .iter()
        .map(|n| n.strip_suffix(".npy").unwrap_or(n).to_string())
        .collect();
    let kind = select_keys(&keys)?;

    let mut read = |key: &str| -> Result<Vec<f64>, ReferenceError> {
        let entry = keys
            .iter()
            .position(|k| k == key)
            .map(|i| entries[i].clone())
            .ok_or_else(|| ReferenceError::MissingKeys { found: keys.clone() })?;
        let array: ArrayD<f64> = npz.by_name(&entry).map_err(decode)?;
        Ok(array.iter().copied().collect())
    };
    let theta = read("theta_deg")?;
    let values = read(kind.key())?;

    ReferencePattern::new(theta, values, kind)
}

//! MATLAB Level-5 `.mat` reference patterns (`mat` feature).

use std::path::Path;

use super::{ReferenceError, ReferencePattern};

#[cfg(feature = "mat")]
pub fn load_mat(path: &Path) -> Result<ReferencePattern, ReferenceError> {
    use super::select_keys;

    let decode = |message: String| ReferenceError::Decode {
        format: "MAT",
        message,
    };

    let mat = matfile::MatFile::parse(std::fs::File::open(path)?).map_err(|e| decode(e.to_string()))?;
    let names: Vec<String> = mat.arrays().iter().map(|a| a.name().to_string()).collect();
    let kind = select_keys(&names)?;

    let read = |key: &str| -> Result<Vec<f64>, ReferenceError> {
        let array = mat
            .find_by_name(key)
            .ok_or_else(|| ReferenceError::MissingKeys { found: names.clone() })?;
        match array.data() {
            matfile::NumericData::Double { real, .. } => Ok(real.clone()),
            matfile::NumericData::Single { real, .. } => Ok(real.iter().map(|&v| v as f64).collect()),
            _ => Err(decode(format!("{} must be a single or double array", key))),
        }
    };
    let theta = read("theta_deg")?;
    let values = read(kind.key())?;

    ReferencePattern::new(theta, values, kind)
}

#[cfg(not(feature = "mat"))]
pub fn load_mat(_path: &Path) -> Result<ReferencePattern, ReferenceError> {
    Err(ReferenceError::MissingDependency {
        format: "MAT",
        dependency: "matfile",
        feature: "mat",
    })
}

//! Per-element phase synthesis.
//!
//! With $k = 2\pi/\lambda$ and element position $\mathbf{r}$:
//!
//! | mode           | phase                                                                   |
//! |----------------|-------------------------------------------------------------------------|
//! | `uniform`      | constant                                                                |
//! | `steer`        | $-k\,\mathbf{r}\cdot\hat{d} + k\,\mathbf{r}\cdot\hat{\imath} + \phi_0$ |
//! | `focus`        | $k\lvert\mathbf{r}-\mathbf{f}\rvert + k\,\mathbf{r}\cdot\hat{\imath}$   |
//! | `custom`       | caller-supplied map                                                     |
//! | `reflectarray` | $-k\,\mathbf{r}'\cdot\hat{d} + k\lvert\mathbf{t}-\mathbf{r}\rvert + \phi_0$ |
//!
//! The incidence term $\hat{\imath}$ is optional for `steer` and `focus`.
//! `reflectarray` uses $\mathbf{r}' = \mathbf{r} - \mathbf{c}$ relative to the
//! panel center and compensates the exact spherical wavefront from the
//! transmitter at $\mathbf{t}$.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use ris_geometry::frame::{dot, norm, normalise, sub};
use ris_geometry::ElementGrid;
use serde::{Deserialize, Serialize};

use crate::error::RisError;
use crate::units::wavenumber;

/// Control intent selected by `control.mode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Uniform,
    Steer,
    Focus,
    Custom,
    Reflectarray,
}

impl FromStr for ControlMode {
    type Err = RisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(ControlMode::Uniform),
            "steer" => Ok(ControlMode::Steer),
            "focus" => Ok(ControlMode::Focus),
            "custom" => Ok(ControlMode::Custom),
            "reflectarray" => Ok(ControlMode::Reflectarray),
            other => Err(RisError::Unsupported {
                kind: "control mode",
                value: other.to_string(),
                expected: "uniform, steer, focus, custom, reflectarray",
            }),
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlMode::Uniform => "uniform",
            ControlMode::Steer => "steer",
            ControlMode::Focus => "focus",
            ControlMode::Custom => "custom",
            ControlMode::Reflectarray => "reflectarray",
        })
    }
}

/// Mode-specific parameters as they appear under `control.params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_rad: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azimuth_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_direction: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_offset_rad: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_offset_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_point: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_map: Option<Vec<Vec<f64>>>,
    /// Keys no control mode reads.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ControlParams {
    /// `direction`, else the unit vector from `azimuth_deg`/`elevation_deg`.
    fn direction(&self, mode: &'static str) -> Result<[f64; 3], RisError> {
        match (self.direction, self.azimuth_deg, self.elevation_deg) {
            (Some(d), _, _) => Ok(normalise(&d, "direction")?),
            (None, Some(az), Some(el)) => Ok(direction_from_angles(az, el)),
            _ => Err(RisError::MissingControlParam {
                mode,
                requirement: "direction or azimuth_deg/elevation_deg",
            }),
        }
    }

    fn incident(&self) -> Result<Option<[f64; 3]>, RisError> {
        self.incident_direction
            .map(|d| normalise(&d, "incident_direction"))
            .transpose()
            .map_err(RisError::from)
    }

    /// `phase_offset_deg` wins over `phase_offset_rad`.
    fn phase_offset_rad(&self) -> f64 {
        self.phase_offset_deg
            .map(f64::to_radians)
            .or(self.phase_offset_rad)
            .unwrap_or(0.0)
    }
}

/// A fully resolved control intent.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseControl {
    Uniform {
        phase_rad: f64,
    },
    Steer {
        direction: [f64; 3],
        incident_direction: Option<[f64; 3]>,
        phase_offset_rad: f64,
    },
    Focus {
        focal_point: [f64; 3],
        incident_direction: Option<[f64; 3]>,
    },
    Custom {
        phase_map: Array2<f64>,
    },
    Reflectarray {
        direction: [f64; 3],
        phase_offset_rad: f64,
    },
}

impl PhaseControl {
    /// Pick the parameters `mode` needs out of `params`.
    pub fn from_params(mode: ControlMode, params: &ControlParams) -> Result<Self, RisError> {
        match mode {
            ControlMode::Uniform => Ok(PhaseControl::Uniform {
                phase_rad: params
                    .phase_rad
                    .or_else(|| params.phase_deg.map(f64::to_radians))
                    .unwrap_or(0.0),
            }),
            ControlMode::Steer => Ok(PhaseControl::Steer {
                direction: params.direction("steer")?,
                incident_direction: params.incident()?,
                phase_offset_rad: params.phase_offset_rad(),
            }),
            ControlMode::Focus => Ok(PhaseControl::Focus {
                focal_point: params.focal_point.ok_or(RisError::MissingControlParam {
                    mode: "focus",
                    requirement: "focal_point",
                })?,
                incident_direction: params.incident()?,
            }),
            ControlMode::Custom => {
                let rows = params.phase_map.as_ref().ok_or(RisError::MissingControlParam {
                    mode: "custom",
                    requirement: "phase_map",
                })?;
                Ok(PhaseControl::Custom {
                    phase_map: rows_to_array(rows)?,
                })
            }
            ControlMode::Reflectarray => Ok(PhaseControl::Reflectarray {
                direction: params.direction("reflectarray")?,
                phase_offset_rad: params.phase_offset_rad(),
            }),
        }
    }

    pub fn mode(&self) -> ControlMode {
        match self {
            PhaseControl::Uniform { .. } => ControlMode::Uniform,
            PhaseControl::Steer { .. } => ControlMode::Steer,
            PhaseControl::Focus { .. } => ControlMode::Focus,
            PhaseControl::Custom { .. } => ControlMode::Custom,
            PhaseControl::Reflectarray { .. } => ControlMode::Reflectarray,
        }
    }

    /// Continuous phase map (radians) of shape `(ny, nx)`.
    ///
    /// `tx_position` is required for `reflectarray`; `ris_center` defaults to
    /// the grid centroid.
    pub fn phase_map(
        &self,
        grid: &ElementGrid,
        wavelength_m: f64,
        tx_position: Option<[f64; 3]>,
        ris_center: Option<[f64; 3]>,
    ) -> Result<Array2<f64>, RisError> {
        let k = wavenumber(wavelength_m);
        let shape = grid.shape();
        let at = |f: &dyn Fn([f64; 3]) -> f64| {
            Array2::from_shape_fn(shape, |(row, col)| f(grid.position(row, col)))
        };
        // Incidence compensation removes the incident plane-wave phase -k r·î.
        let incidence = |r: &[f64; 3], inc: &Option<[f64; 3]>| inc.map_or(0.0, |i| k * dot(r, &i));

        let phase = match self {
            PhaseControl::Uniform { phase_rad } => Array2::from_elem(shape, *phase_rad),
            PhaseControl::Steer {
                direction,
                incident_direction,
                phase_offset_rad,
            } => at(&|r: [f64; 3]| {
                -k * dot(&r, direction) + incidence(&r, incident_direction) + phase_offset_rad
            }),
            PhaseControl::Focus {
                focal_point,
                incident_direction,
            } => at(&|r: [f64; 3]| k * norm(&sub(&r, focal_point)) + incidence(&r, incident_direction)),
            PhaseControl::Custom { phase_map } => {
                if phase_map.dim() != shape {
                    return Err(RisError::ShapeMismatch {
                        found: phase_map.dim(),
                        expected: shape,
                    });
                }
                phase_map.clone()
            }
            PhaseControl::Reflectarray {
                direction,
                phase_offset_rad,
            } => {
                let tx = tx_position.ok_or(RisError::MissingControlParam {
                    mode: "reflectarray",
                    requirement: "a transmitter position",
                })?;
                let center = ris_center.unwrap_or_else(|| grid.centroid());
                at(&|r: [f64; 3]| {
                    let outgoing = -k * dot(&sub(&r, &center), direction);
                    let incident = -k * norm(&sub(&tx, &r));
                    outgoing - incident + phase_offset_rad
                })
            }
        };

        log::debug!("synthesized {} phase map {:?}", self.mode(), shape);
        Ok(phase)
    }
}

/// `[cos(el)cos(az), cos(el)sin(az), sin(el)]`.
pub fn direction_from_angles(azimuth_deg: f64, elevation_deg: f64) -> [f64; 3] {
    let (sa, ca) = azimuth_deg.to_radians().sin_cos();
    let (se, ce) = elevation_deg.to_radians().sin_cos();
    [ce * ca, ce * sa, se]
}

fn rows_to_array(rows: &[Vec<f64>]) -> Result<Array2<f64>, RisError> {
    let ny = rows.len();
    let nx = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|r| r.len() != nx) {
        return Err(RisError::invalid(
            "control.params.phase_map",
            format!("rows must have equal length (found {} and {})", nx, bad.len()),
        ));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((ny, nx), flat)
        .map_err(|e| RisError::invalid("control.params.phase_map", e.to_string()))
}

/// Resolve `mode`/`params` and synthesize in one step.
pub fn synthesize(
    mode: ControlMode,
    params: &ControlParams,
    grid: &ElementGrid,
    wavelength_m: f64,
    tx_position: Option<[f64; 3]>,
    ris_center: Option<[f64; 3]>,
) -> Result<Array2<f64>, RisError> {
    PhaseControl::from_params(mode, params)?.phase_map(grid, wavelength_m, tx_position, ris_center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ris_geometry::compute_element_centers;
    use std::f64::consts::PI;

    fn grid() -> ElementGrid {
        compute_element_centers(4, 3, 0.005, 0.005, None, None, None).unwrap()
    }

    #[test]
    fn test_uniform_prefers_radians() {
        let params = ControlParams {
            phase_rad: Some(0.5),
            phase_deg: Some(90.0),
            ..Default::default()
        };
        let p = synthesize(ControlMode::Uniform, &params, &grid(), 0.01, None, None).unwrap();
        assert!(p.iter().all(|&v| v == 0.5));

        let params = ControlParams {
            phase_deg: Some(90.0),
            ..Default::default()
        };
        let p = synthesize(ControlMode::Uniform, &params, &grid(), 0.01, None, None).unwrap();
        assert!(p.iter().all(|&v| (v - PI / 2.0).abs() < 1e-12));

        let p = synthesize(ControlMode::Uniform, &ControlParams::default(), &grid(), 0.01, None, None)
            .unwrap();
        assert_eq!(p.dim(), (3, 4));
        assert!(p.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_steer_gradient() {
        let g = grid();
        let lambda = 0.01;
        let params = ControlParams {
            azimuth_deg: Some(0.0),
            elevation_deg: Some(0.0),
            ..Default::default()
        };
        // Direction +x: phase is -k x.
        let p = synthesize(ControlMode::Steer, &params, &g, lambda, None, None).unwrap();
        let k = 2.0 * PI / lambda;
        for row in 0..3 {
            for col in 0..4 {
                let x = g.position(row, col)[0];
                assert!((p[[row, col]] + k * x).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_steer_incidence_cancels_matching_direction() {
        let params = ControlParams {
            direction: Some([1.0, 1.0, 2.0]),
            incident_direction: Some([2.0, 2.0, 4.0]),
            ..Default::default()
        };
        let p = synthesize(ControlMode::Steer, &params, &grid(), 0.01, None, None).unwrap();
        assert!(p.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_steer_applies_phase_offset() {
        let g = grid();
        let base = ControlParams {
            direction: Some([0.3, -0.2, 1.0]),
            ..Default::default()
        };
        let shifted = ControlParams {
            phase_offset_deg: Some(90.0),
            ..base.clone()
        };
        let p0 = synthesize(ControlMode::Steer, &base, &g, 0.01, None, None).unwrap();
        let p1 = synthesize(ControlMode::Steer, &shifted, &g, 0.01, None, None).unwrap();
        for (a, b) in p1.iter().zip(p0.iter()) {
            let delta = (a - b).rem_euclid(2.0 * PI);
            assert!((delta - PI / 2.0).abs() < 1e-9, "delta = {}", delta);
        }

        let control = PhaseControl::from_params(ControlMode::Steer, &shifted).unwrap();
        match control {
            PhaseControl::Steer { phase_offset_rad, .. } => {
                assert!((phase_offset_rad - PI / 2.0).abs() < 1e-12)
            }
            other => panic!("unexpected control {:?}", other),
        }
    }

    #[test]
    fn test_focus_uses_positive_distance() {
        let g = grid();
        let params = ControlParams {
            focal_point: Some([0.0, 0.0, 1.0]),
            ..Default::default()
        };
        let p = synthesize(ControlMode::Focus, &params, &g, 0.01, None, None).unwrap();
        let k = 2.0 * PI / 0.01;
        let r = g.position(0, 0);
        let d = (r[0].powi(2) + r[1].powi(2) + 1.0).sqrt();
        assert!((p[[0, 0]] - k * d).abs() < 1e-9);
    }

    #[test]
    fn test_custom_shape_checked() {
        let params = ControlParams {
            phase_map: Some(vec![vec![0.0; 3]; 4]),
            ..Default::default()
        };
        let err = synthesize(ControlMode::Custom, &params, &grid(), 0.01, None, None).unwrap_err();
        assert!(err.to_string().contains("(4, 3)"), "{}", err);

        let ragged = ControlParams {
            phase_map: Some(vec![vec![0.0; 4], vec![0.0; 3]]),
            ..Default::default()
        };
        assert!(synthesize(ControlMode::Custom, &ragged, &grid(), 0.01, None, None).is_err());
    }

    #[test]
    fn test_reflectarray_compensates_spherical_wave() {
        let g = grid();
        let lambda = 0.01;
        let k = 2.0 * PI / lambda;
        let tx = [0.1, 0.0, 0.3];
        let params = ControlParams {
            direction: Some([0.0, 0.0, 1.0]),
            phase_offset_deg: Some(180.0),
            phase_offset_rad: Some(1.0),
            ..Default::default()
        };
        let p = synthesize(ControlMode::Reflectarray, &params, &g, lambda, Some(tx), None).unwrap();
        for row in 0..3 {
            for col in 0..4 {
                let r = g.position(row, col);
                let expected = k * norm(&sub(&tx, &r)) + PI;
                assert!((p[[row, col]] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_missing_parameters() {
        let g = grid();
        let err = synthesize(ControlMode::Steer, &ControlParams::default(), &g, 0.01, None, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "steer control requires direction or azimuth_deg/elevation_deg"
        );
        assert!(synthesize(ControlMode::Focus, &ControlParams::default(), &g, 0.01, None, None)
            .is_err());
        let params = ControlParams {
            direction: Some([0.0, 0.0, 1.0]),
            ..Default::default()
        };
        assert!(synthesize(ControlMode::Reflectarray, &params, &g, 0.01, None, None).is_err());
        assert!("beam".parse::<ControlMode>().is_err());
    }

    #[test]
    fn test_direction_from_angles() {
        let d = direction_from_angles(90.0, 0.0);
        assert!(d[0].abs() < 1e-12 && (d[1] - 1.0).abs() < 1e-12);
        let d = direction_from_angles(0.0, 90.0);
        assert!((d[2] - 1.0).abs() < 1e-12);
    }
}

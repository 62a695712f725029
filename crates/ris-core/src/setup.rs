//! Experiment assembly: from a resolved configuration to grid, transmitter,
//! phase map, and pattern.

use ndarray::Array2;
use ris_geometry::{compute_element_centers, ElementGrid};
use serde::{Deserialize, Serialize};

use crate::config::RisLabConfig;
use crate::error::RisError;
use crate::pattern::array_factor::ArrayFactorModel;
use crate::pattern::near_field::{LinkBudget, NearFieldModel};
use crate::pattern::{PatternModel, PatternModelKind, PatternSample};
use crate::units::linear_to_db;

/// Point at `distance_m` from `center` at `angle_deg` in the panel's `(w, u)` plane.
pub fn tx_position(grid: &ElementGrid, center: &[f64; 3], distance_m: f64, angle_deg: f64) -> [f64; 3] {
    grid.frame.point_in_azimuth_plane(center, distance_m, angle_deg)
}

/// Point-to-point link evaluation at one receive angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkResult {
    pub rx_angle_deg: f64,
    /// Unnormalized model output (watts for the near-field model).
    pub link_gain_linear: f64,
    pub link_gain_db: f64,
}

/// Geometry and transmitter placement derived from one configuration.
#[derive(Debug, Clone)]
pub struct ExperimentSetup {
    pub config: RisLabConfig,
    pub grid: ElementGrid,
    /// Centroid of the element centers.
    pub ris_center: [f64; 3],
    pub tx_position: [f64; 3],
    pub wavelength_m: f64,
}

impl ExperimentSetup {
    pub fn from_config(config: &RisLabConfig) -> Result<Self, RisError> {
        let g = &config.geometry;
        let grid = compute_element_centers(
            g.nx as i64,
            g.ny as i64,
            g.dx,
            g.dy,
            Some(g.origin),
            Some(g.normal),
            Some(g.x_axis_hint),
        )?;
        let ris_center = grid.centroid();
        let exp = &config.experiment;
        let tx = tx_position(&grid, &ris_center, exp.tx_distance_m, exp.tx_angle_deg);

        Ok(Self {
            config: config.clone(),
            wavelength_m: config.wavelength_m(),
            grid,
            ris_center,
            tx_position: tx,
        })
    }

    /// Synthesized and quantized phase map.
    pub fn phase_map(&self) -> Result<Array2<f64>, RisError> {
        let continuous = self.config.phase_control()?.phase_map(
            &self.grid,
            self.wavelength_m,
            Some(self.tx_position),
            Some(self.ris_center),
        )?;
        Ok(self.config.quantization_policy()?.apply(&continuous))
    }

    pub fn near_field_model(&self) -> NearFieldModel {
        let exp = &self.config.experiment;
        NearFieldModel {
            wavelength_m: self.wavelength_m,
            tx_position: self.tx_position,
            ris_center: self.ris_center,
            rx_distance_m: exp.rx_distance_m,
            budget: LinkBudget {
                reflection_coeff: exp.reflection_coeff,
                element_area_m2: exp.element_area_m2,
                tx_gain_dbi: exp.tx_gain_dbi,
                rx_gain_dbi: exp.rx_gain_dbi,
                tx_power_dbm: exp.tx_power_dbm,
            },
        }
    }

    /// The pattern model named by `pattern_mode.model`.
    pub fn model(&self) -> Box<dyn PatternModel> {
        match self.config.pattern_mode.model {
            PatternModelKind::NearField => Box::new(self.near_field_model()),
            PatternModelKind::ArrayFactor => Box::new(ArrayFactorModel {
                wavelength_m: self.wavelength_m,
            }),
        }
    }

    /// Raw model output at `theta_deg`.
    pub fn evaluate(&self, phase: &Array2<f64>, theta_deg: &[f64]) -> Result<Vec<f64>, RisError> {
        self.model().evaluate(&self.grid, phase, theta_deg)
    }

    /// Normalized pattern over the configured sweep.
    pub fn pattern(&self, phase: &Array2<f64>) -> Result<PatternSample, RisError> {
        let theta = self.config.pattern_mode.rx_sweep_deg.angles()?;
        let linear = self.evaluate(phase, &theta)?;
        PatternSample::from_linear(theta, &linear, self.config.pattern_mode.normalization)
    }

    /// Pattern of the unconfigured panel (uniform zero phase).
    pub fn off_baseline(&self) -> Result<PatternSample, RisError> {
        self.pattern(&Array2::zeros(self.grid.shape()))
    }

    /// Unnormalized response at `link_mode.rx_angle_deg`.
    pub fn link(&self, phase: &Array2<f64>) -> Result<LinkResult, RisError> {
        let rx_angle_deg = self.config.link_mode.rx_angle_deg;
        let linear = self.evaluate(phase, &[rx_angle_deg])?[0];
        Ok(LinkResult {
            rx_angle_deg,
            link_gain_linear: linear,
            link_gain_db: linear_to_db(linear),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, resolve_config, ConfigFormat};

    fn setup(extra: &str) -> ExperimentSetup {
        let src = format!("geometry:\n  nx: 8\n  ny: 8\n  dx: 0.005\n  dy: 0.005\n{}", extra);
        let cfg = resolve_config(parse_config(&src, ConfigFormat::Yaml).unwrap()).unwrap();
        ExperimentSetup::from_config(&cfg).unwrap()
    }

    #[test]
    fn test_tx_placement() {
        let s = setup("experiment:\n  tx_angle_deg: 90\n  tx_distance_m: 0.5\n");
        assert!((s.tx_position[0] - 0.5).abs() < 1e-12);
        assert!(s.tx_position[2].abs() < 1e-12);
        assert!(s.ris_center.iter().all(|c| c.abs() < 1e-12));
    }

    #[test]
    fn test_pattern_is_peak_normalized() {
        let s = setup("control:\n  mode: reflectarray\n  params:\n    azimuth_deg: 0\n    elevation_deg: 90\n");
        let phase = s.phase_map().unwrap();
        let p = s.pattern(&phase).unwrap();
        assert_eq!(p.len(), 91);
        let peak = p.db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(peak.abs() < 1e-9);
    }

    #[test]
    fn test_quantized_phase_uses_alphabet() {
        let s = setup("control:\n  mode: focus\n  params:\n    focal_point: [0.0, 0.0, 0.5]\nquantization:\n  bits: 1\n");
        let phase = s.phase_map().unwrap();
        assert!(phase
            .iter()
            .all(|&v| v == 0.0 || (v - std::f64::consts::PI).abs() < 1e-12));
    }

    #[test]
    fn test_link_and_model_selection() {
        let s = setup("link_mode:\n  rx_angle_deg: 30\n");
        let phase = s.phase_map().unwrap();
        let link = s.link(&phase).unwrap();
        assert_eq!(link.rx_angle_deg, 30.0);
        assert!(link.link_gain_linear > 0.0);
        assert_eq!(s.model().name(), "near_field");

        let s = setup("pattern_mode:\n  model: array_factor\n");
        assert_eq!(s.model().name(), "array_factor");
        let base = s.off_baseline().unwrap();
        // Uniform zero phase on the array factor peaks at broadside.
        assert_eq!(base.theta_deg[crate::pattern::argmax(&base.db).unwrap()], 0.0);
    }
}

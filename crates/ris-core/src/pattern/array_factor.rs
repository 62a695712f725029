//! Far-field array factor.
//!
//! $$
//! AF(\theta) = \Bigl|\sum_n e^{j(k\,\mathbf{r}_n\cdot\hat{d}(\theta) + \phi_n)}\Bigr|^2,
//! \qquad \hat{d}(\theta) = \cos\theta\,\hat{w} + \sin\theta\,\hat{u}
//! $$
//!
//! Plane-wave illumination and an isotropic element are assumed, so this is
//! only a steering sanity check. Use [`super::near_field::NearFieldModel`]
//! for link budgets.

use ndarray::Array2;
use num_complex::Complex64;
use ris_geometry::frame::dot;
use ris_geometry::ElementGrid;

use crate::error::RisError;
use crate::pattern::{check_phase_shape, map_angles, PatternModel};
use crate::units::wavenumber;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayFactorModel {
    pub wavelength_m: f64,
}

impl PatternModel for ArrayFactorModel {
    fn evaluate(
        &self,
        grid: &ElementGrid,
        phase: &Array2<f64>,
        theta_deg: &[f64],
    ) -> Result<Vec<f64>, RisError> {
        check_phase_shape(grid, phase)?;
        let k = wavenumber(self.wavelength_m);
        let frame = grid.frame;
        let positions = grid.positions();
        let phases: Vec<f64> = phase.iter().copied().collect();

        Ok(map_angles(theta_deg, |theta| {
            let d = frame.azimuth_direction(theta);
            let mut af = Complex64::new(0.0, 0.0);
            for (p, &phi) in positions.iter().zip(phases.iter()) {
                af += Complex64::new(0.0, k * dot(p, &d) + phi).exp();
            }
            af.norm_sqr()
        }))
    }

    fn name(&self) -> &str {
        "array_factor"
    }
}

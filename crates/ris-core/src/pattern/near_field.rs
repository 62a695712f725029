//! Near-field reflectarray link model.
//!
//! For a receiver at angle $\theta$ in the panel's `(w, u)` plane, element $n$
//! contributes
//!
//! $$
//! E_n = \frac{\sqrt{F_n}\,\Gamma_n}{r_{t,n}\, r_{r,n}} e^{-jk(r_{t,n} + r_{r,n})},
//! \qquad \Gamma_n = \rho\, e^{j\phi_n}
//! $$
//!
//! with the cosine-taper element gain
//!
//! $$
//! F_n = \cos^{\alpha_t}\theta^{c}_{t,n}\,\cos\theta^{e}_{t,n}\,
//!       \cos\theta^{e}_{r,n}\,\cos^{\alpha_r}\theta^{c}_{r,n},
//! \qquad \alpha = G/2 - 1
//! $$
//!
//! and received power
//!
//! $$
//! P_r = \frac{P_t G_t G_r A^2}{16\pi^2} \Bigl|\sum_n E_n\Bigr|^2 .
//! $$
//!
//! The superscript `e` cosines are taken at the element (projection of the
//! element-to-antenna ray onto the normal). The superscript `c` cosines are
//! taken at the antenna, between its boresight to the panel center and the
//! ray to the element. All cosines are clamped to `[0, 1]`.

use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex64;
use ris_geometry::frame::{dot, norm, sub};
use ris_geometry::ElementGrid;
use serde::{Deserialize, Serialize};

use crate::error::RisError;
use crate::pattern::{check_phase_shape, map_angles, PatternModel};
use crate::units::{db_to_linear, dbm_to_watts, wavenumber};

/// Antenna and element parameters of the link budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkBudget {
    /// Element reflection amplitude $\rho \in [0, 1]$.
    pub reflection_coeff: f64,
    /// Physical area of one element (m²).
    pub element_area_m2: f64,
    pub tx_gain_dbi: f64,
    pub rx_gain_dbi: f64,
    pub tx_power_dbm: f64,
}

impl LinkBudget {
    /// $P_t G_t G_r A^2 / (16\pi^2)$ in watts·m⁴.
    pub fn prefactor(&self) -> f64 {
        dbm_to_watts(self.tx_power_dbm)
            * db_to_linear(self.tx_gain_dbi)
            * db_to_linear(self.rx_gain_dbi)
            * self.element_area_m2.powi(2)
            / (16.0 * PI * PI)
    }

    /// Cosine-taper exponents $(\alpha_t, \alpha_r)$.
    pub fn taper_exponents(&self) -> (f64, f64) {
        (
            db_to_linear(self.tx_gain_dbi) / 2.0 - 1.0,
            db_to_linear(self.rx_gain_dbi) / 2.0 - 1.0,
        )
    }
}

/// Near-field RIS link model with a fixed transmitter.
#[derive(Debug, Clone, PartialEq)]
pub struct NearFieldModel {
    pub wavelength_m: f64,
    /// Transmitter position (m).
    pub tx_position: [f64; 3],
    /// Panel center; receive angles are measured about this point.
    pub ris_center: [f64; 3],
    /// Receiver distance from the panel center (m).
    pub rx_distance_m: f64,
    pub budget: LinkBudget,
}

/// Per-element quantities that do not depend on the receive angle.
struct TxTerms {
    positions: Vec<[f64; 3]>,
    /// Element to panel-center distance.
    center_offset: Vec<f64>,
    /// `√(cos_tx_center^α_t · cos_tx_elem) · Γ / r_t · e^{-jk r_t}`.
    weight: Vec<Complex64>,
}

#[inline]
fn clamp_unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Law-of-cosines angle at the antenna between the panel center and an element.
#[inline]
fn cos_at_antenna(to_center: f64, to_element: f64, center_offset: f64) -> f64 {
    let denom = 2.0 * to_center * to_element;
    if !(denom > 0.0) {
        return 1.0;
    }
    clamp_unit((to_center.powi(2) + to_element.powi(2) - center_offset.powi(2)) / denom)
}

impl NearFieldModel {
    fn tx_terms(&self, grid: &ElementGrid, phase: &Array2<f64>) -> TxTerms {
        let k = wavenumber(self.wavelength_m);
        let w = grid.frame.w;
        let (alpha_t, _) = self.budget.taper_exponents();
        let tx_to_center = norm(&sub(&self.tx_position, &self.ris_center));

        let positions = grid.positions();
        let mut center_offset = Vec::with_capacity(positions.len());
        let mut weight = Vec::with_capacity(positions.len());

        for (idx, p) in positions.iter().enumerate() {
            let (row, col) = (idx / grid.nx(), idx % grid.nx());
            let to_tx = sub(&self.tx_position, p);
            let r_t = norm(&to_tx);
            let d_n = norm(&sub(p, &self.ris_center));
            center_offset.push(d_n);
            // An element at the antenna phase centre carries no term.
            if !(r_t > 0.0) {
                weight.push(Complex64::new(0.0, 0.0));
                continue;
            }

            let cos_elem = clamp_unit(dot(&to_tx, &w).abs() / r_t);
            let cos_center = cos_at_antenna(tx_to_center, r_t, d_n);
            let taper = (cos_center.powf(alpha_t) * cos_elem).max(0.0);

            let gamma = Complex64::from_polar(self.budget.reflection_coeff, phase[[row, col]]);
            let propagation = Complex64::new(0.0, -k * r_t).exp();

            weight.push(taper.sqrt() * gamma * propagation / r_t);
        }

        TxTerms {
            positions,
            center_offset,
            weight,
        }
    }

    /// Coherent element sum for one receive angle, reduced in row-major order.
    fn field_sum(&self, terms: &TxTerms, w: &[f64; 3], rx: &[f64; 3]) -> Complex64 {
        let k = wavenumber(self.wavelength_m);
        let (_, alpha_r) = self.budget.taper_exponents();
        let rx_to_center = norm(&sub(rx, &self.ris_center));

        let mut total = Complex64::new(0.0, 0.0);
        for ((p, &d_n), &wt) in terms
            .positions
            .iter()
            .zip(terms.center_offset.iter())
            .zip(terms.weight.iter())
        {
            let to_rx = sub(rx, p);
            let r_r = norm(&to_rx);
            if !(r_r > 0.0) {
                continue;
            }
            let cos_elem = clamp_unit(dot(&to_rx, w).abs() / r_r);
            let cos_center = cos_at_antenna(rx_to_center, r_r, d_n);
            let taper = (cos_elem * cos_center.powf(alpha_r)).max(0.0);
            total += wt * taper.sqrt() / r_r * Complex64::new(0.0, -k * r_r).exp();
        }
        total
    }

    /// Received power (W) with the receiver at `rx_angle_deg`.
    pub fn link_power(
        &self,
        grid: &ElementGrid,
        phase: &Array2<f64>,
        rx_angle_deg: f64,
    ) -> Result<f64, RisError> {
        let power = self.evaluate(grid, phase, &[rx_angle_deg])?;
        Ok(power[0])
    }
}

impl PatternModel for NearFieldModel {
    fn evaluate(
        &self,
        grid: &ElementGrid,
        phase: &Array2<f64>,
        theta_deg: &[f64],
    ) -> Result<Vec<f64>, RisError> {
        check_phase_shape(grid, phase)?;
        let terms = self.tx_terms(grid, phase);
        let prefactor = self.budget.prefactor();
        let frame = grid.frame;

        log::debug!(
            "near-field sweep: {} elements x {} angles",
            grid.len(),
            theta_deg.len()
        );

        Ok(map_angles(theta_deg, |theta| {
            let rx = frame.point_in_azimuth_plane(&self.ris_center, self.rx_distance_m, theta);
            prefactor * self.field_sum(&terms, &frame.w, &rx).norm_sqr()
        }))
    }

    fn name(&self) -> &str {
        "near_field"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ris_geometry::compute_element_centers;

    fn budget() -> LinkBudget {
        LinkBudget {
            reflection_coeff: 1.0,
            element_area_m2: 1e-4,
            tx_gain_dbi: 15.0,
            rx_gain_dbi: 22.0,
            tx_power_dbm: 28.0,
        }
    }

    #[test]
    fn test_single_element_matches_closed_form() {
        let grid = compute_element_centers(1, 1, 0.01, 0.01, None, None, None).unwrap();
        let model = NearFieldModel {
            wavelength_m: 0.01,
            tx_position: [0.0, 0.0, 1.0],
            ris_center: [0.0; 3],
            rx_distance_m: 2.0,
            budget: budget(),
        };
        let phase = Array2::zeros((1, 1));
        // Broadside: every cosine is 1, so |Σ|² = 1 / (r_t r_r)².
        let p = model.link_power(&grid, &phase, 0.0).unwrap();
        let expected = model.budget.prefactor() / (1.0 * 2.0_f64).powi(2);
        assert_relative_eq!(p, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_reflection_coeff_scales_power() {
        let grid = compute_element_centers(4, 4, 0.005, 0.005, None, None, None).unwrap();
        let mut model = NearFieldModel {
            wavelength_m: 0.0107,
            tx_position: [0.2, 0.0, 0.35],
            ris_center: [0.0; 3],
            rx_distance_m: 2.0,
            budget: budget(),
        };
        let phase = Array2::zeros((4, 4));
        let theta = [-20.0, 0.0, 30.0];
        let full = model.evaluate(&grid, &phase, &theta).unwrap();
        model.budget.reflection_coeff = 0.5;
        let half = model.evaluate(&grid, &phase, &theta).unwrap();
        for (f, h) in full.iter().zip(half.iter()) {
            assert_relative_eq!(*h, 0.25 * f, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_grazing_receiver_is_silent() {
        let grid = compute_element_centers(1, 1, 0.01, 0.01, None, None, None).unwrap();
        let model = NearFieldModel {
            wavelength_m: 0.01,
            tx_position: [0.0, 0.0, 1.0],
            ris_center: [0.0; 3],
            rx_distance_m: 2.0,
            budget: budget(),
        };
        let p = model.evaluate(&grid, &Array2::zeros((1, 1)), &[90.0]).unwrap();
        assert!(p[0] < 1e-20, "grazing power should vanish, got {}", p[0]);
        assert!(p[0] >= 0.0);
    }

    #[test]
    fn test_antenna_on_element_stays_finite() {
        let grid = compute_element_centers(2, 2, 0.01, 0.01, None, None, None).unwrap();
        let model = NearFieldModel {
            wavelength_m: 0.01,
            tx_position: grid.position(0, 0),
            ris_center: grid.centroid(),
            rx_distance_m: 2.0,
            budget: budget(),
        };
        let p = model
            .evaluate(&grid, &Array2::zeros((2, 2)), &[-30.0, 0.0, 30.0])
            .unwrap();
        assert!(p.iter().all(|v| v.is_finite() && *v >= 0.0), "{:?}", p);

        let single = compute_element_centers(1, 1, 0.01, 0.01, None, None, None).unwrap();
        let model = NearFieldModel {
            tx_position: single.position(0, 0),
            ris_center: single.centroid(),
            ..model
        };
        let p = model.link_power(&single, &Array2::zeros((1, 1)), 0.0).unwrap();
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_phase_shape_checked() {
        let grid = compute_element_centers(3, 2, 0.01, 0.01, None, None, None).unwrap();
        let model = NearFieldModel {
            wavelength_m: 0.01,
            tx_position: [0.0, 0.0, 1.0],
            ris_center: [0.0; 3],
            rx_distance_m: 2.0,
            budget: budget(),
        };
        let err = model.evaluate(&grid, &Array2::zeros((3, 2)), &[0.0]).unwrap_err();
        assert!(matches!(err, RisError::ShapeMismatch { .. }));
    }
}

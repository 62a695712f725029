//! Physical constants and unit conversions.

use std::f64::consts::PI;

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// Floor added to linear power before `log10` so silent samples stay finite.
pub const DB_FLOOR: f64 = 1e-12;

/// Free-space wavelength (m) at `frequency_hz`.
pub fn wavelength_m(frequency_hz: f64) -> f64 {
    SPEED_OF_LIGHT_M_S / frequency_hz
}

/// Free-space wavenumber $k = 2\pi/\lambda$ (rad/m).
pub fn wavenumber(wavelength_m: f64) -> f64 {
    2.0 * PI / wavelength_m
}

/// Decibels to a linear power ratio.
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Linear power to decibels with the [`DB_FLOOR`] applied.
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * (linear + DB_FLOOR).log10()
}

/// dBm to watts.
pub fn dbm_to_watts(dbm: f64) -> f64 {
    10.0_f64.powf((dbm - 30.0) / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert!((db_to_linear(20.0) - 100.0).abs() < 1e-9);
        assert!((dbm_to_watts(30.0) - 1.0).abs() < 1e-12);
        assert!((linear_to_db(1.0)).abs() < 1e-9);
        assert!((linear_to_db(0.0) + 120.0).abs() < 1e-9);
        let lam = wavelength_m(28e9);
        assert!((lam - 0.010_706_873).abs() < 1e-8);
    }
}
